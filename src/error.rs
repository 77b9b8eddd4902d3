//! Error taxonomy.
//!
//! Recoverable device conditions (underruns, suspends, "try again") never show up here: the renderer
//! handles them where they happen. What is left is either fatal at startup, fatal while rendering,
//! or a MIDI hiccup the listener logs and moves past.

use std::fmt;

/// Errors raised while validating the startup configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A bounded parameter is outside its accepted range.
    #[error("invalid {what} = {value}, must be within [{min}...{max}]")]
    OutOfRange {
        /// Parameter name as shown to users.
        what: &'static str,
        /// Rejected value.
        value: u32,
        /// Smallest accepted value.
        min: u32,
        /// Largest accepted value.
        max: u32,
    },
}

/// Raw failure reported by the audio backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// Positive errno value.
    pub errno: i32,
    /// Backend description of the failure.
    pub message: String,
}

impl BackendError {
    /// Wraps an errno value and its description.
    pub fn new(errno: i32, message: impl Into<String>) -> Self {
        Self {
            errno,
            message: message.into(),
        }
    }
}

impl From<alsa::Error> for BackendError {
    fn from(value: alsa::Error) -> Self {
        Self {
            errno: value.errno(),
            message: value.to_string(),
        }
    }
}

/// A stream parameter the negotiator asks the device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Parameter {
    /// The full hardware configuration space of the device.
    Configurations,
    Resample,
    Access,
    Format,
    Channels,
    Rate,
    BufferTime,
    BufferSize,
    PeriodTime,
    PeriodSize,
    HardwareCommit,
    SoftwareCurrent,
    StartThreshold,
    AvailMin,
    SoftwareCommit,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameter::Configurations => "configuration space",
            Parameter::Resample => "resampling",
            Parameter::Access => "access type",
            Parameter::Format => "sample format",
            Parameter::Channels => "channel count",
            Parameter::Rate => "rate",
            Parameter::BufferTime => "buffer time",
            Parameter::BufferSize => "buffer size",
            Parameter::PeriodTime => "period time",
            Parameter::PeriodSize => "period size",
            Parameter::HardwareCommit => "hw params",
            Parameter::SoftwareCurrent => "current sw params",
            Parameter::StartThreshold => "start threshold",
            Parameter::AvailMin => "avail min",
            Parameter::SoftwareCommit => "sw params",
        };
        f.write_str(name)
    }
}

/// Errors raised by the PCM device, during negotiation or while streaming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The playback device could not be opened.
    #[error("error opening PCM device {device}: {source}")]
    Open {
        /// Device name as configured.
        device: String,
        /// Backend failure.
        source: BackendError,
    },

    /// The device refused a stream parameter.
    #[error("unable to set {parameter} for playback: {source}")]
    Rejected {
        /// Parameter being set.
        parameter: Parameter,
        /// Backend failure.
        source: BackendError,
    },

    /// The device only offers a rate other than the requested one.
    #[error("rate doesn't match (requested {requested}Hz, got {actual}Hz)")]
    RateMismatch {
        /// Configured rate in Hz.
        requested: u32,
        /// Rate the device picked in Hz.
        actual: u32,
    },

    /// A stream operation failed after negotiation.
    #[error("{operation} failed: {source}")]
    Stream {
        /// Name of the failed operation, such as `prepare`.
        operation: &'static str,
        /// Backend failure.
        source: BackendError,
    },
}

impl DeviceError {
    pub(crate) fn rejected(parameter: Parameter) -> impl FnOnce(BackendError) -> Self {
        move |source| DeviceError::Rejected { parameter, source }
    }
}

/// Fatal conditions of the real-time loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// A write failed with a non-recoverable error.
    #[error("write error: {0}")]
    Write(DeviceError),

    /// Preparing the stream after an underrun failed.
    #[error("can't recover from underrun: {0}")]
    Underrun(DeviceError),

    /// Preparing the stream after a suspend failed.
    #[error("can't recover from suspend: {0}")]
    Suspend(DeviceError),

    /// Stopping the stream on idle failed.
    #[error("can't stop the stream: {0}")]
    Halt(DeviceError),
}

/// Lookup outside the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScaleError {
    /// The note has no key on the keyboard.
    #[error("MIDI note {note} is outside the keyboard range [{min}...{max}]")]
    OutOfRange {
        /// Requested MIDI note.
        note: u8,
        /// Lowest key.
        min: u8,
        /// Highest key.
        max: u8,
    },
}

/// Errors on the MIDI input side.
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    /// The MIDI client could not be created.
    #[error("error opening MIDI input: {0}")]
    Init(#[from] midir::InitError),

    /// A port vanished while it was being listed.
    #[error("error reading MIDI port info: {0}")]
    PortInfo(#[from] midir::PortInfoError),

    /// Connecting to a port failed.
    #[error("error connecting MIDI input {port}: {message}")]
    Connect {
        /// Port name.
        port: String,
        /// midir's description of the failure.
        message: String,
    },

    /// Nothing could be connected.
    #[error("no MIDI input port available{}", .filter.as_ref().map(|f| format!(" matching {f:?}")).unwrap_or_default())]
    NoPorts {
        /// Port name filter in effect, if any.
        filter: Option<String>,
    },

    /// Bytes that don't form a MIDI message.
    #[error("malformed MIDI message {bytes:02x?}: {reason:?}")]
    Malformed {
        /// Raw message.
        bytes: Vec<u8>,
        /// Parser diagnosis.
        reason: wmidi::FromBytesError,
    },

    /// A note outside the keyboard.
    #[error(transparent)]
    Scale(#[from] ScaleError),
}

/// Top-level error handed back to the launcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Opening or configuring the output device failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The renderer stopped on a fatal error.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// MIDI setup failed.
    #[error(transparent)]
    Midi(#[from] MidiError),

    /// A worker thread could not be started.
    #[error("error creating {name} thread: {source}")]
    Spawn {
        /// Thread role, such as `audio`.
        name: &'static str,
        /// OS failure.
        source: std::io::Error,
    },

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

/// Result type defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
