//! ALSA playback backend.

use ::alsa::pcm::{Access, Format, Frames, HwParams, PCM, SwParams};
use ::alsa::{Direction, Output, ValueOr};

use super::{
    HardwareParams, NegotiatedGeometry, PcmOutput, Resume, SoftwareParams, WriteError, negotiate,
};
use crate::config::StreamConfig;
use crate::error::{BackendError, DeviceError, Parameter};

fn frames(count: usize) -> Frames {
    count as Frames
}

fn count(frames: Frames) -> Result<usize, BackendError> {
    usize::try_from(frames)
        .map_err(|_| BackendError::new(libc::EINVAL, format!("negative frame count {frames}")))
}

struct AlsaHardware<'a> {
    pcm: &'a PCM,
    params: HwParams<'a>,
}

impl<'a> AlsaHardware<'a> {
    fn any(pcm: &'a PCM) -> Result<Self, BackendError> {
        Ok(Self {
            pcm,
            params: HwParams::any(pcm)?,
        })
    }
}

impl HardwareParams for AlsaHardware<'_> {
    fn set_rate_resample(&mut self, enabled: bool) -> Result<(), BackendError> {
        Ok(self.params.set_rate_resample(enabled)?)
    }

    fn set_access_interleaved(&mut self) -> Result<(), BackendError> {
        Ok(self.params.set_access(Access::RWInterleaved)?)
    }

    fn set_format_s16(&mut self) -> Result<(), BackendError> {
        Ok(self.params.set_format(Format::s16())?)
    }

    fn set_channels(&mut self, channels: u32) -> Result<(), BackendError> {
        Ok(self.params.set_channels(channels)?)
    }

    fn set_rate_near(&mut self, rate: u32) -> Result<u32, BackendError> {
        Ok(self.params.set_rate_near(rate, ValueOr::Nearest)?)
    }

    fn set_buffer_time_near(&mut self, time_us: u32) -> Result<u32, BackendError> {
        Ok(self.params.set_buffer_time_near(time_us, ValueOr::Nearest)?)
    }

    fn buffer_size(&self) -> Result<usize, BackendError> {
        count(self.params.get_buffer_size()?)
    }

    fn set_period_time_near(&mut self, time_us: u32) -> Result<u32, BackendError> {
        Ok(self.params.set_period_time_near(time_us, ValueOr::Nearest)?)
    }

    fn period_size(&self) -> Result<usize, BackendError> {
        count(self.params.get_period_size()?)
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        Ok(self.pcm.hw_params(&self.params)?)
    }
}

struct AlsaSoftware<'a> {
    pcm: &'a PCM,
    params: Option<SwParams<'a>>,
}

impl<'a> AlsaSoftware<'a> {
    fn new(pcm: &'a PCM) -> Self {
        Self { pcm, params: None }
    }

    fn params(&self) -> Result<&SwParams<'a>, BackendError> {
        self.params
            .as_ref()
            .ok_or_else(|| BackendError::new(libc::EBADFD, "software parameters not loaded"))
    }
}

impl SoftwareParams for AlsaSoftware<'_> {
    fn load_current(&mut self) -> Result<(), BackendError> {
        self.params = Some(self.pcm.sw_params_current()?);
        Ok(())
    }

    fn set_start_threshold(&mut self, count: usize) -> Result<(), BackendError> {
        Ok(self.params()?.set_start_threshold(frames(count))?)
    }

    fn set_avail_min(&mut self, count: usize) -> Result<(), BackendError> {
        Ok(self.params()?.set_avail_min(frames(count))?)
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        Ok(self.pcm.sw_params(self.params()?)?)
    }
}

/// An open, configured ALSA playback stream.
pub struct AlsaDevice {
    pcm: PCM,
    geometry: NegotiatedGeometry,
    channels: usize,
}

impl AlsaDevice {
    /// Opens `config.device_name` for blocking playback and negotiates the stream.
    pub fn open(config: &StreamConfig) -> Result<Self, DeviceError> {
        let pcm = PCM::new(&config.device_name, Direction::Playback, false).map_err(|e| {
            DeviceError::Open {
                device: config.device_name.clone(),
                source: e.into(),
            }
        })?;

        let geometry = {
            let mut hw =
                AlsaHardware::any(&pcm).map_err(DeviceError::rejected(Parameter::Configurations))?;
            let mut sw = AlsaSoftware::new(&pcm);
            negotiate(&mut hw, &mut sw, config)?
        };

        log::info!(
            "PCM device {}: {} Hz, {} channels, buffer {} frames, period {} frames",
            config.device_name,
            config.sample_rate_hz,
            config.channel_count,
            geometry.buffer_size,
            geometry.period_size
        );

        Ok(Self {
            pcm,
            geometry,
            channels: config.channel_count as usize,
        })
    }

    /// Buffer and period sizes picked during negotiation.
    pub fn geometry(&self) -> NegotiatedGeometry {
        self.geometry
    }

    /// Human-readable dump of the PCM setup.
    pub fn dump(&self) -> Result<String, BackendError> {
        let mut output = Output::buffer_open()?;
        self.pcm.dump(&mut output)?;
        Ok(output.to_string())
    }
}

impl PcmOutput for AlsaDevice {
    fn channels(&self) -> usize {
        self.channels
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, WriteError> {
        let io = self.pcm.io_i16().map_err(BackendError::from)?;
        io.writei(samples)
            .map_err(|e| WriteError::from(BackendError::from(e)))
    }

    fn prepare(&mut self) -> Result<(), BackendError> {
        Ok(self.pcm.prepare()?)
    }

    fn resume(&mut self) -> Result<Resume, BackendError> {
        match self.pcm.resume() {
            Ok(()) => Ok(Resume::Resumed),
            Err(e) if e.errno() == libc::EAGAIN => Ok(Resume::Pending),
            Err(e) => Err(e.into()),
        }
    }

    fn halt(&mut self) -> Result<(), BackendError> {
        self.pcm.drop()?;
        self.pcm.prepare()?;
        Ok(())
    }
}
