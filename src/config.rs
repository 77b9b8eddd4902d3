//! Startup configuration.
//!
//! Everything here is built once, validated, and then moved into the components before any thread
//! starts. Nothing is mutated afterwards.

use std::ops::RangeInclusive;

use crate::error::ConfigError;

/// Accepted stream rates in Hz.
pub const RATE_RANGE: RangeInclusive<u32> = 4000..=96000;

/// Accepted channel counts (2 is stereo).
pub const CHANNELS_RANGE: RangeInclusive<u32> = 1..=24;

/// Accepted ring buffer lengths in microseconds.
pub const BUFFER_TIME_RANGE: RangeInclusive<u32> = 1000..=1_000_000;

/// Accepted period lengths in microseconds.
pub const PERIOD_TIME_RANGE: RangeInclusive<u32> = 1000..=1_000_000;

/// Accepted MIDI channels, numbered the way users see them.
pub const MIDI_CHANNEL_RANGE: RangeInclusive<u8> = 1..=16;

/// Parameters of the PCM output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// ALSA playback device name, e.g. `hw:0,0` or `default`.
    pub device_name: String,
    /// Stream rate in Hz.
    pub sample_rate_hz: u32,
    /// Number of interleaved channels.
    pub channel_count: u32,
    /// Ring buffer length in microseconds.
    pub buffer_time_us: u32,
    /// Period length in microseconds.
    pub period_time_us: u32,
    /// Lets alsa-lib resample when the hardware can't do the rate natively.
    pub resample_enabled: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            device_name: "hw:0,0".to_owned(),
            sample_rate_hz: 44100,
            channel_count: 2,
            buffer_time_us: 50_000,
            period_time_us: 10_000,
            resample_enabled: false,
        }
    }
}

impl StreamConfig {
    /// Checks every bounded field, reporting the first one out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("rate", self.sample_rate_hz, RATE_RANGE)?;
        check("channels", self.channel_count, CHANNELS_RANGE)?;
        check("buffer time", self.buffer_time_us, BUFFER_TIME_RANGE)?;
        check("period time", self.period_time_us, PERIOD_TIME_RANGE)?;
        Ok(())
    }
}

/// A MIDI channel the listener reacts to.
///
/// Stored 0-based, the way it appears on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenChannel(u8);

impl ListenChannel {
    /// Builds a channel from its user-facing number (1 to 16).
    pub fn from_number(number: u8) -> Result<Self, ConfigError> {
        if MIDI_CHANNEL_RANGE.contains(&number) {
            Ok(Self(number - 1))
        } else {
            Err(ConfigError::OutOfRange {
                what: "MIDI channel",
                value: number.into(),
                min: (*MIDI_CHANNEL_RANGE.start()).into(),
                max: (*MIDI_CHANNEL_RANGE.end()).into(),
            })
        }
    }

    /// The 0-based wire index.
    pub fn index(self) -> u8 {
        self.0
    }

    /// The 1-based number shown to users.
    pub fn number(self) -> u8 {
        self.0 + 1
    }
}

/// Parameters of the MIDI input side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiConfig {
    /// Channel whose note events are played.
    pub channel: ListenChannel,
    /// Client name announced to the MIDI system.
    pub client_name: String,
    /// When set, only input ports whose name contains this string are connected.
    pub port_filter: Option<String>,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            channel: ListenChannel::default(),
            client_name: "piano".to_owned(),
            port_filter: None,
        }
    }
}

/// Complete configuration handed to [`crate::Synth::spawn`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthConfig {
    /// Output stream parameters.
    pub stream: StreamConfig,
    /// MIDI input parameters.
    pub midi: MidiConfig,
    /// Dumps the negotiated PCM setup after opening the device.
    pub verbose: bool,
}

impl SynthConfig {
    /// Checks the bounded stream parameters. The MIDI channel is checked when it is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()
    }
}

fn check(what: &'static str, value: u32, range: RangeInclusive<u32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            what,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}
