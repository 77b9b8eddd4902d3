//! Fake devices for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::device::{HardwareParams, PcmOutput, Resume, SoftwareParams, WriteError};
use crate::error::BackendError;

fn invalid() -> BackendError {
    BackendError::new(libc::EINVAL, "Invalid argument")
}

/// Parameter calls recorded by [`FakeParams`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamCall {
    Resample(bool),
    Access,
    Format,
    Channels(u32),
    Rate(u32),
    BufferTime(u32),
    PeriodTime(u32),
    CommitHardware,
    LoadSoftware,
    StartThreshold(usize),
    AvailMin(usize),
    CommitSoftware,
}

#[derive(Debug, Default)]
struct ParamsLog {
    calls: Vec<ParamCall>,
    buffer_size: usize,
    period_size: usize,
    reject: Option<ParamCall>,
}

/// Hardware that only runs at `native_rate` and rounds times to whole frames.
#[derive(Debug, Clone)]
pub struct FakeParams {
    log: Arc<Mutex<ParamsLog>>,
    native_rate: u32,
}

impl FakeParams {
    pub fn new(native_rate: u32) -> Self {
        Self {
            log: Arc::default(),
            native_rate,
        }
    }

    /// Fails the matching call with `EINVAL`.
    pub fn rejecting(self, call: ParamCall) -> Self {
        self.lock().reject = Some(call);
        self
    }

    pub fn calls(&self) -> Vec<ParamCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ParamsLog> {
        self.log.lock().unwrap()
    }

    fn record(&self, call: ParamCall) -> Result<(), BackendError> {
        let mut log = self.lock();
        if log.reject.as_ref() == Some(&call) {
            return Err(invalid());
        }
        log.calls.push(call);
        Ok(())
    }

    fn frames(&self, time_us: u32) -> usize {
        (u64::from(self.native_rate) * u64::from(time_us) / 1_000_000) as usize
    }
}

impl HardwareParams for FakeParams {
    fn set_rate_resample(&mut self, enabled: bool) -> Result<(), BackendError> {
        self.record(ParamCall::Resample(enabled))
    }

    fn set_access_interleaved(&mut self) -> Result<(), BackendError> {
        self.record(ParamCall::Access)
    }

    fn set_format_s16(&mut self) -> Result<(), BackendError> {
        self.record(ParamCall::Format)
    }

    fn set_channels(&mut self, channels: u32) -> Result<(), BackendError> {
        self.record(ParamCall::Channels(channels))
    }

    fn set_rate_near(&mut self, rate: u32) -> Result<u32, BackendError> {
        self.record(ParamCall::Rate(rate))?;
        Ok(self.native_rate)
    }

    fn set_buffer_time_near(&mut self, time_us: u32) -> Result<u32, BackendError> {
        self.record(ParamCall::BufferTime(time_us))?;
        let frames = self.frames(time_us);
        self.lock().buffer_size = frames;
        Ok(time_us)
    }

    fn buffer_size(&self) -> Result<usize, BackendError> {
        Ok(self.lock().buffer_size)
    }

    fn set_period_time_near(&mut self, time_us: u32) -> Result<u32, BackendError> {
        self.record(ParamCall::PeriodTime(time_us))?;
        let frames = self.frames(time_us);
        self.lock().period_size = frames;
        Ok(time_us)
    }

    fn period_size(&self) -> Result<usize, BackendError> {
        Ok(self.lock().period_size)
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        self.record(ParamCall::CommitHardware)
    }
}

impl SoftwareParams for FakeParams {
    fn load_current(&mut self) -> Result<(), BackendError> {
        self.record(ParamCall::LoadSoftware)
    }

    fn set_start_threshold(&mut self, frames: usize) -> Result<(), BackendError> {
        self.record(ParamCall::StartThreshold(frames))
    }

    fn set_avail_min(&mut self, frames: usize) -> Result<(), BackendError> {
        self.record(ParamCall::AvailMin(frames))
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        self.record(ParamCall::CommitSoftware)
    }
}

/// Calls recorded by [`FakePcm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PcmEvent {
    /// Frames accepted by a write.
    Wrote(usize),
    Rejected(WriteError),
    Prepare,
    Resume,
    Halt,
}

/// Scripted outcome of the next write.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    Fail(WriteError),
    /// Accept at most this many frames.
    Partial(usize),
}

#[derive(Debug, Default)]
struct PcmLog {
    writes: VecDeque<WriteOutcome>,
    prepares: VecDeque<Result<(), BackendError>>,
    resumes: VecDeque<Result<Resume, BackendError>>,
    events: Vec<PcmEvent>,
    samples: Vec<i16>,
}

/// Playback stream that records everything and never blocks.
#[derive(Debug, Clone)]
pub struct FakePcm {
    log: Arc<Mutex<PcmLog>>,
    channels: usize,
    pace: Option<Duration>,
}

impl FakePcm {
    pub fn new(channels: usize) -> Self {
        Self {
            log: Arc::default(),
            channels,
            pace: None,
        }
    }

    /// Sleeps this long in every write, standing in for a blocking device.
    pub fn paced(channels: usize, pace: Duration) -> Self {
        Self {
            pace: Some(pace),
            ..Self::new(channels)
        }
    }

    pub fn script_write(&self, outcome: WriteOutcome) -> &Self {
        self.lock().writes.push_back(outcome);
        self
    }

    pub fn script_prepare(&self, result: Result<(), BackendError>) -> &Self {
        self.lock().prepares.push_back(result);
        self
    }

    pub fn script_resume(&self, result: Result<Resume, BackendError>) -> &Self {
        self.lock().resumes.push_back(result);
        self
    }

    pub fn events(&self) -> Vec<PcmEvent> {
        self.lock().events.clone()
    }

    pub fn samples(&self) -> Vec<i16> {
        self.lock().samples.clone()
    }

    pub fn frames_written(&self) -> usize {
        self.lock().samples.len() / self.channels
    }

    /// Clones of this device still alive, this one included.
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.log)
    }

    fn lock(&self) -> MutexGuard<'_, PcmLog> {
        self.log.lock().unwrap()
    }
}

impl PcmOutput for FakePcm {
    fn channels(&self) -> usize {
        self.channels
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, WriteError> {
        if let Some(pace) = self.pace {
            std::thread::sleep(pace);
        }
        let channels = self.channels;
        let mut log = self.lock();
        let mut frames = samples.len() / channels;
        match log.writes.pop_front() {
            Some(WriteOutcome::Fail(error)) => {
                log.events.push(PcmEvent::Rejected(error.clone()));
                return Err(error);
            }
            Some(WriteOutcome::Partial(limit)) => frames = frames.min(limit),
            None => {}
        }
        log.samples.extend_from_slice(&samples[..frames * channels]);
        log.events.push(PcmEvent::Wrote(frames));
        Ok(frames)
    }

    fn prepare(&mut self) -> Result<(), BackendError> {
        let mut log = self.lock();
        log.events.push(PcmEvent::Prepare);
        log.prepares.pop_front().unwrap_or(Ok(()))
    }

    fn resume(&mut self) -> Result<Resume, BackendError> {
        let mut log = self.lock();
        log.events.push(PcmEvent::Resume);
        log.resumes.pop_front().unwrap_or(Ok(Resume::Resumed))
    }

    fn halt(&mut self) -> Result<(), BackendError> {
        self.lock().events.push(PcmEvent::Halt);
        Ok(())
    }
}

/// Polls `condition` until it holds, panicking after `timeout`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {timeout:?}");
        std::thread::sleep(Duration::from_millis(1));
    }
}
