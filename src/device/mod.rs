//! PCM output device: parameter negotiation and the write interface the renderer drives.
//!
//! Negotiation talks to the device through [`HardwareParams`] and [`SoftwareParams`]; streaming goes
//! through [`PcmOutput`]. The production implementation of all three is [`alsa::AlsaDevice`].

pub mod alsa;

pub use self::alsa::AlsaDevice;

use crate::config::StreamConfig;
use crate::error::{BackendError, DeviceError, Parameter};

/// Buffer geometry the device settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedGeometry {
    /// Ring buffer length in frames.
    pub buffer_size: usize,
    /// Frames written per pass of the renderer.
    pub period_size: usize,
}

impl NegotiatedGeometry {
    /// Largest whole number of periods that fits in the buffer.
    ///
    /// Playback starts once this many frames are queued.
    pub fn start_threshold(&self) -> usize {
        if self.period_size == 0 {
            return self.buffer_size;
        }
        (self.buffer_size / self.period_size) * self.period_size
    }

    /// Frames that must be free before a blocked write wakes up: one period.
    pub fn avail_min(&self) -> usize {
        self.period_size
    }
}

/// Hardware stage of the negotiation.
///
/// The `*_near` setters return the value the device actually picked.
pub trait HardwareParams {
    /// Allows or forbids resampling in alsa-lib.
    fn set_rate_resample(&mut self, enabled: bool) -> Result<(), BackendError>;
    /// Selects interleaved read/write access.
    fn set_access_interleaved(&mut self) -> Result<(), BackendError>;
    /// Selects signed 16-bit native-endian samples.
    fn set_format_s16(&mut self) -> Result<(), BackendError>;
    /// Sets the exact channel count.
    fn set_channels(&mut self, channels: u32) -> Result<(), BackendError>;
    /// Requests a rate in Hz.
    fn set_rate_near(&mut self, rate: u32) -> Result<u32, BackendError>;
    /// Requests a ring buffer length in microseconds.
    fn set_buffer_time_near(&mut self, time_us: u32) -> Result<u32, BackendError>;
    /// Ring buffer length in frames for the chosen buffer time.
    fn buffer_size(&self) -> Result<usize, BackendError>;
    /// Requests a period length in microseconds.
    fn set_period_time_near(&mut self, time_us: u32) -> Result<u32, BackendError>;
    /// Period length in frames for the chosen period time.
    fn period_size(&self) -> Result<usize, BackendError>;
    /// Writes the chosen parameters to the device.
    fn commit(&mut self) -> Result<(), BackendError>;
}

/// Software stage of the negotiation. Only meaningful once the hardware geometry is committed.
pub trait SoftwareParams {
    /// Loads the device's current software parameters.
    fn load_current(&mut self) -> Result<(), BackendError>;
    /// Queued frames needed before playback starts.
    fn set_start_threshold(&mut self, frames: usize) -> Result<(), BackendError>;
    /// Free frames needed before a blocked write returns.
    fn set_avail_min(&mut self, frames: usize) -> Result<(), BackendError>;
    /// Writes the chosen parameters to the device.
    fn commit(&mut self) -> Result<(), BackendError>;
}

/// Negotiates hardware then software parameters for `config`.
pub fn negotiate(
    hw: &mut impl HardwareParams,
    sw: &mut impl SoftwareParams,
    config: &StreamConfig,
) -> Result<NegotiatedGeometry, DeviceError> {
    let geometry = negotiate_hardware(hw, config)?;
    negotiate_software(sw, &geometry)?;
    Ok(geometry)
}

fn negotiate_hardware(
    hw: &mut impl HardwareParams,
    config: &StreamConfig,
) -> Result<NegotiatedGeometry, DeviceError> {
    use Parameter::*;

    hw.set_rate_resample(config.resample_enabled)
        .map_err(DeviceError::rejected(Resample))?;
    hw.set_access_interleaved()
        .map_err(DeviceError::rejected(Access))?;
    hw.set_format_s16().map_err(DeviceError::rejected(Format))?;
    hw.set_channels(config.channel_count)
        .map_err(DeviceError::rejected(Channels))?;

    let rate = hw
        .set_rate_near(config.sample_rate_hz)
        .map_err(DeviceError::rejected(Rate))?;
    if rate != config.sample_rate_hz {
        return Err(DeviceError::RateMismatch {
            requested: config.sample_rate_hz,
            actual: rate,
        });
    }

    hw.set_buffer_time_near(config.buffer_time_us)
        .map_err(DeviceError::rejected(BufferTime))?;
    let buffer_size = hw.buffer_size().map_err(DeviceError::rejected(BufferSize))?;
    hw.set_period_time_near(config.period_time_us)
        .map_err(DeviceError::rejected(PeriodTime))?;
    let period_size = hw.period_size().map_err(DeviceError::rejected(PeriodSize))?;

    hw.commit().map_err(DeviceError::rejected(HardwareCommit))?;

    Ok(NegotiatedGeometry {
        buffer_size,
        period_size,
    })
}

fn negotiate_software(
    sw: &mut impl SoftwareParams,
    geometry: &NegotiatedGeometry,
) -> Result<(), DeviceError> {
    use Parameter::*;

    sw.load_current()
        .map_err(DeviceError::rejected(SoftwareCurrent))?;
    sw.set_start_threshold(geometry.start_threshold())
        .map_err(DeviceError::rejected(StartThreshold))?;
    sw.set_avail_min(geometry.avail_min())
        .map_err(DeviceError::rejected(AvailMin))?;
    sw.commit().map_err(DeviceError::rejected(SoftwareCommit))?;
    Ok(())
}

/// Why a write didn't go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The device is busy; retry right away.
    Again,
    /// The buffer ran dry before it was refilled.
    Underrun,
    /// The system suspended the device.
    Suspended,
    /// Anything else.
    Failed(BackendError),
}

impl From<BackendError> for WriteError {
    fn from(error: BackendError) -> Self {
        match error.errno {
            libc::EAGAIN => WriteError::Again,
            libc::EPIPE => WriteError::Underrun,
            libc::ESTRPIPE => WriteError::Suspended,
            _ => WriteError::Failed(error),
        }
    }
}

/// Outcome of a resume attempt after a suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// The device is running again.
    Resumed,
    /// The suspend flag is still set; try again later.
    Pending,
}

/// A playback stream accepting interleaved signed 16-bit frames.
pub trait PcmOutput {
    /// Number of interleaved channels per frame.
    fn channels(&self) -> usize;

    /// Writes as many whole frames of `samples` as the device accepts, returning the frame count.
    fn write(&mut self, samples: &[i16]) -> Result<usize, WriteError>;

    /// Puts the stream back into the ready state.
    fn prepare(&mut self) -> Result<(), BackendError>;

    /// Tries to bring a suspended stream back.
    fn resume(&mut self) -> Result<Resume, BackendError>;

    /// Discards queued frames and leaves the stream ready for the next write.
    fn halt(&mut self) -> Result<(), BackendError>;
}
