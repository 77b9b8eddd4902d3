//! Monophonic sine synthesizer playing the notes received on one MIDI channel.

use std::process::ExitCode;

use clap::Parser;
use piano_synth::error::ConfigError;
use piano_synth::{ListenChannel, MidiConfig, StreamConfig, Synth, SynthConfig};

#[derive(Debug, Parser)]
#[command(version, about)]
struct CliArgs {
    /// Audio playback device.
    #[arg(short, long, default_value = "hw:0,0")]
    device: String,

    /// Stream rate in Hz (4000...96000).
    #[arg(short, long, default_value_t = 44100)]
    rate: u32,

    /// Number of audio channels in the stream (1...24).
    #[arg(short, long, default_value_t = 2)]
    channels: u32,

    /// Ring buffer time in microseconds (1000...1000000).
    #[arg(short, long, default_value_t = 50_000)]
    buffer: u32,

    /// Period time in microseconds (1000...1000000).
    #[arg(short, long, default_value_t = 10_000)]
    period: u32,

    /// Enable software resampling.
    #[arg(short = 'R', long)]
    resample: bool,

    /// Restrict MIDI input to a channel (1...16).
    #[arg(short, long, default_value_t = 1)]
    midichan: u8,

    /// Only connect MIDI inputs whose name contains this string.
    #[arg(long)]
    midi_port: Option<String>,

    /// Be verbose.
    #[arg(short, long)]
    verbose: bool,
}

impl CliArgs {
    fn into_config(self) -> Result<SynthConfig, ConfigError> {
        let config = SynthConfig {
            stream: StreamConfig {
                device_name: self.device,
                sample_rate_hz: self.rate,
                channel_count: self.channels,
                buffer_time_us: self.buffer,
                period_time_us: self.period,
                resample_enabled: self.resample,
            },
            midi: MidiConfig {
                channel: ListenChannel::from_number(self.midichan)?,
                port_filter: self.midi_port,
                ..MidiConfig::default()
            },
            verbose: self.verbose,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = args
        .into_config()
        .map_err(piano_synth::Error::from)
        .and_then(Synth::run_forever);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", env!("CARGO_PKG_NAME"));
            ExitCode::FAILURE
        }
    }
}
