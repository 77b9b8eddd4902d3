#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

pub mod config;
pub mod device;
pub mod error;
pub mod midi;
pub mod oscillator;
pub mod renderer;
pub mod scale;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::{ListenChannel, MidiConfig, StreamConfig, SynthConfig};
pub use device::{AlsaDevice, NegotiatedGeometry, PcmOutput};
pub use error::{Error, Result};
pub use midi::{MidiConnections, MidiListener, MidiPacket, NoteEvent};
pub use renderer::Renderer;
pub use scale::FrequencyTable;
pub use state::{Snapshot, SynthState};

/// Synthesizer running the audio and MIDI threads.
pub struct Synth {
    /// MIDI connections. Dropping them ends the listener thread.
    pub midi_connections: MidiConnections,

    engine: Engine,
}

impl Synth {
    /// Opens the output device, connects the MIDI inputs and starts rendering.
    /// It returns a synth object that must be kept alive.
    pub fn spawn(config: SynthConfig) -> Result<Self> {
        config.validate()?;
        let table = FrequencyTable::equal_temperament();

        let device = AlsaDevice::open(&config.stream)?;
        if config.verbose {
            match device.dump() {
                Ok(dump) => log::info!("PCM setup:\n{dump}"),
                Err(e) => log::warn!("Can't dump PCM setup: {e}"),
            }
        }
        let geometry = device.geometry();

        let (midi_sender, midi_receiver) = mpsc::channel();
        let midi_connections = midi::connect_inputs(&config.midi, midi_sender)?;
        log::info!("Listening on MIDI channel {}", config.midi.channel.number());

        let engine = Engine::spawn(device, geometry, &config, table, midi_receiver)?;

        Ok(Self {
            midi_connections,
            engine,
        })
    }

    /// Spawns the synth and keeps it alive until a fatal error.
    pub fn run_forever(config: SynthConfig) -> Result<()> {
        let synth = Self::spawn(config)?;
        synth.wait()
    }

    /// State shared by the audio and MIDI threads.
    pub fn state(&self) -> &Arc<SynthState> {
        self.engine.state()
    }

    /// Blocks until the renderer stops, returning its error if it failed.
    pub fn wait(self) -> Result<()> {
        let Self {
            midi_connections,
            engine,
        } = self;
        let result = engine.wait();
        drop(midi_connections);
        result
    }
}

/// The renderer and listener threads around one shared state.
pub struct Engine {
    state: Arc<SynthState>,
    renderer: JoinHandle<Result<(), error::RenderError>>,
    listener: JoinHandle<()>,
}

impl Engine {
    /// Starts the renderer on `device` and a listener fed by `midi_receiver`.
    pub fn spawn<D>(
        device: D,
        geometry: NegotiatedGeometry,
        config: &SynthConfig,
        table: FrequencyTable,
        midi_receiver: mpsc::Receiver<MidiPacket>,
    ) -> Result<Self>
    where
        D: PcmOutput + Send + 'static,
    {
        let midi_thread = thread::Builder::new().name("midi".into());
        Self::spawn_with(device, geometry, config, table, midi_receiver, midi_thread)
    }

    fn spawn_with<D>(
        device: D,
        geometry: NegotiatedGeometry,
        config: &SynthConfig,
        table: FrequencyTable,
        midi_receiver: mpsc::Receiver<MidiPacket>,
        midi_thread: thread::Builder,
    ) -> Result<Self>
    where
        D: PcmOutput + Send + 'static,
    {
        let state = SynthState::new();
        let sample_rate = config.stream.sample_rate_hz;

        let renderer = {
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name("audio".into())
                .spawn(move || {
                    let result = Renderer::new(device, geometry, sample_rate).run(&state);
                    if let Err(e) = &result {
                        log::error!("{e}");
                    }
                    result
                })
                .map_err(|source| Error::Spawn {
                    name: "audio",
                    source,
                })?
        };

        let listener = MidiListener::new(config.midi.channel, table, Arc::clone(&state));
        let listener = midi_thread
            .spawn(move || listener.run(midi_receiver))
            .map_err(|source| {
                // The renderer is already running and would otherwise wait forever.
                state.shutdown();
                Error::Spawn {
                    name: "MIDI",
                    source,
                }
            })?;

        Ok(Self {
            state,
            renderer,
            listener,
        })
    }

    /// State shared by the renderer and the listener.
    pub fn state(&self) -> &Arc<SynthState> {
        &self.state
    }

    /// Blocks until the renderer stops.
    pub fn wait(self) -> Result<()> {
        let result = self
            .renderer
            .join()
            .map_err(|_| Error::Panicked("audio"))?;
        result.map_err(Error::from)
    }

    /// Stops the renderer and waits for both threads.
    ///
    /// The listener only ends once its MIDI senders are dropped, so drop the connections first.
    pub fn shutdown(self) -> Result<()> {
        self.state.shutdown();
        let Self {
            renderer, listener, ..
        } = self;
        let rendered = renderer.join().map_err(|_| Error::Panicked("audio"))?;
        listener.join().map_err(|_| Error::Panicked("MIDI"))?;
        rendered.map_err(Error::from)
    }
}
