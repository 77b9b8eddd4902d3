//! MIDI input: port connections and the listener that turns note events into synthesis state.

use std::sync::{Arc, mpsc};

use midir::{MidiInput, MidiInputConnection};
use wmidi::MidiMessage;

use crate::config::{ListenChannel, MidiConfig};
use crate::error::MidiError;
use crate::scale::FrequencyTable;
use crate::state::{MAX_AMPLITUDE, SynthState};

/// A raw message with its timestamp in microseconds, as delivered by midir.
pub type MidiPacket = (u64, Vec<u8>);

/// Vector of MIDI connections with an attached mpsc sender.
pub type MidiConnections = Vec<MidiInputConnection<mpsc::Sender<MidiPacket>>>;

/// Connects the input ports selected by `config` to an mpsc sender.
///
/// Every port is connected unless `config.port_filter` is set, in which case only ports whose name
/// contains the filter are. Failing to connect at least one port is an error.
pub fn connect_inputs(
    config: &MidiConfig,
    sender: mpsc::Sender<MidiPacket>,
) -> Result<MidiConnections, MidiError> {
    let mut connections = MidiConnections::new();

    let scan = MidiInput::new(&format!("{} scan input", config.client_name))?;

    for port in scan.ports().iter() {
        let port_name = scan.port_name(port)?;
        if let Some(filter) = &config.port_filter {
            if !port_name.contains(filter.as_str()) {
                log::debug!("Skipping MIDI input {port_name}");
                continue;
            }
        }

        let input = MidiInput::new(&format!("{} input", config.client_name))?;
        log::info!("Connecting to MIDI input {port_name}");
        let connection = input
            .connect(
                port,
                &config.client_name,
                |timestamp, message, sender| {
                    sender.send((timestamp, Vec::from(message))).ok();
                },
                sender.clone(),
            )
            .map_err(|e| MidiError::Connect {
                port: port_name.clone(),
                message: e.to_string(),
            })?;
        connections.push(connection);
    }

    if connections.is_empty() {
        return Err(MidiError::NoPorts {
            filter: config.port_filter.clone(),
        });
    }
    Ok(connections)
}

/// The subset of MIDI the synthesizer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NoteEvent {
    /// A key was pressed. Channels are 0-based.
    On { channel: u8, note: u8, velocity: u8 },
    /// A key was released.
    Off { channel: u8, note: u8 },
}

impl NoteEvent {
    /// Parses raw bytes. Messages other than note events yield `None`.
    pub fn parse(bytes: &[u8]) -> Result<Option<NoteEvent>, MidiError> {
        let message = MidiMessage::from_bytes(bytes).map_err(|reason| MidiError::Malformed {
            bytes: bytes.to_vec(),
            reason,
        })?;
        let event = match message {
            MidiMessage::NoteOn(channel, note, velocity) => NoteEvent::On {
                channel: channel.index(),
                note: u8::from(note),
                velocity: u8::from(velocity),
            },
            MidiMessage::NoteOff(channel, note, _) => NoteEvent::Off {
                channel: channel.index(),
                note: u8::from(note),
            },
            _ => return Ok(None),
        };
        Ok(Some(event.normalized()))
    }

    /// Some keyboards never send Note-Off and use Note-On with velocity 0 instead, which MIDI allows.
    pub fn normalized(self) -> NoteEvent {
        match self {
            NoteEvent::On {
                channel,
                note,
                velocity: 0,
            } => NoteEvent::Off { channel, note },
            event => event,
        }
    }

    /// 0-based channel index.
    pub fn channel(&self) -> u8 {
        match *self {
            NoteEvent::On { channel, .. } | NoteEvent::Off { channel, .. } => channel,
        }
    }
}

/// Applies note events on one channel to the shared state.
///
/// There is a single voice: a Note-On retunes it, and any Note-Off on the channel silences it no
/// matter which note started it.
#[derive(Debug)]
pub struct MidiListener {
    channel: ListenChannel,
    table: FrequencyTable,
    state: Arc<SynthState>,
}

impl MidiListener {
    /// A listener for `channel` that looks notes up in `table`.
    pub fn new(channel: ListenChannel, table: FrequencyTable, state: Arc<SynthState>) -> Self {
        Self {
            channel,
            table,
            state,
        }
    }

    /// Handles messages until every sender is gone.
    ///
    /// Bad messages are logged and skipped.
    pub fn run(&self, receiver: mpsc::Receiver<MidiPacket>) {
        for (timestamp, bytes) in receiver {
            if let Err(e) = self.handle_message(&bytes) {
                log::warn!("MIDI input at {timestamp}: {e}");
            }
        }
        log::debug!("MIDI input closed");
    }

    /// Parses and applies one raw message.
    pub fn handle_message(&self, bytes: &[u8]) -> Result<(), MidiError> {
        match NoteEvent::parse(bytes)? {
            Some(event) => self.handle(event),
            None => {
                log::trace!("Ignoring MIDI message {bytes:02x?}");
                Ok(())
            }
        }
    }

    /// Applies one event if it is on the listened channel.
    pub fn handle(&self, event: NoteEvent) -> Result<(), MidiError> {
        let event = event.normalized();
        if event.channel() != self.channel.index() {
            return Ok(());
        }
        match event {
            NoteEvent::On { note, velocity, .. } => {
                let key = self.table.key(note)?;
                log::debug!(
                    "NoteOn: chan={}, note={}, vel={velocity} (freq={:.3})",
                    self.channel.number(),
                    key.name,
                    key.frequency
                );
                self.state.set_note(key.frequency, MAX_AMPLITUDE);
            }
            NoteEvent::Off { note, .. } => {
                log::debug!("NoteOff: chan={}, note={note}", self.channel.number());
                self.state.set_amplitude(0);
            }
        }
        Ok(())
    }
}
