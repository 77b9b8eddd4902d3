//! The real-time audio loop.
//!
//! One period at a time: load the shared snapshot, synthesize, write the whole period to the device,
//! recovering from underruns and suspends on the way. Once a note stops, the renderer keeps writing
//! silent periods until a whole buffer of silence follows the last audible frame, so everything that
//! was queued gets played. Only then does it stop the stream and park on the shared state instead of
//! spinning.

use std::thread;
use std::time::Duration;

use crate::device::{NegotiatedGeometry, PcmOutput, Resume, WriteError};
use crate::error::{BackendError, DeviceError, RenderError};
use crate::oscillator::Oscillator;
use crate::state::{DEFAULT_FREQUENCY, Snapshot, SynthState};

/// Pause between resume attempts while the device is suspended.
pub const SUSPEND_RETRY: Duration = Duration::from_secs(1);

fn stream_error(operation: &'static str) -> impl FnOnce(BackendError) -> DeviceError {
    move |source| DeviceError::Stream { operation, source }
}

/// Drives a [`PcmOutput`] from the shared synthesis state.
pub struct Renderer<D> {
    device: D,
    oscillator: Oscillator,
    period: Vec<i16>,
    period_size: usize,
    running: bool,
    /// Silent periods to write after a note before the stream may be stopped.
    tail_periods: usize,
    /// Silent periods written since the last audible one.
    silent_periods: usize,
    suspend_retry: Duration,
}

impl<D: PcmOutput> Renderer<D> {
    /// Creates a renderer writing `geometry.period_size` frames at a time to `device`.
    pub fn new(device: D, geometry: NegotiatedGeometry, sample_rate: u32) -> Self {
        let channels = device.channels();
        Self {
            oscillator: Oscillator::new(channels, sample_rate, DEFAULT_FREQUENCY),
            period: vec![0; geometry.period_size * channels],
            period_size: geometry.period_size,
            running: false,
            tail_periods: geometry.buffer_size.div_ceil(geometry.period_size.max(1)),
            silent_periods: 0,
            suspend_retry: SUSPEND_RETRY,
            device,
        }
    }

    /// Overrides [`SUSPEND_RETRY`].
    pub fn with_suspend_retry(mut self, retry: Duration) -> Self {
        self.suspend_retry = retry;
        self
    }

    /// Renders until `state` is shut down.
    ///
    /// Only unrecoverable device errors end the loop early.
    pub fn run(&mut self, state: &SynthState) -> Result<(), RenderError> {
        loop {
            if state.is_shut_down() {
                return Ok(());
            }
            let mut snapshot = state.snapshot();
            if snapshot.is_silent() && !self.flushing() {
                self.idle()?;
                match state.wait_for_sound() {
                    Some(sounding) => snapshot = sounding,
                    None => return Ok(()),
                }
                log::trace!("leaving idle at {:.3} Hz", snapshot.frequency);
            }
            self.render_period(snapshot)?;
        }
    }

    /// Synthesizes one period for `snapshot` and writes it out.
    pub fn render_period(&mut self, snapshot: Snapshot) -> Result<(), RenderError> {
        self.oscillator.set_frequency(snapshot.frequency);
        self.oscillator
            .fill(&mut self.period, self.period_size, snapshot.amplitude);
        self.running = true;
        if snapshot.is_silent() {
            self.silent_periods += 1;
        } else {
            self.silent_periods = 0;
        }
        self.write_period()
    }

    /// Whether queued audio still has to be pushed out with silence.
    ///
    /// A full buffer of silence also reaches the start threshold, so a note shorter than the
    /// buffer still starts playback.
    fn flushing(&self) -> bool {
        self.running && self.silent_periods < self.tail_periods
    }

    /// Stops a running stream. Only silence is left in the queue at this point.
    fn idle(&mut self) -> Result<(), RenderError> {
        if self.running {
            self.device
                .halt()
                .map_err(|e| RenderError::Halt(stream_error("drop")(e)))?;
            self.running = false;
            log::debug!("renderer idle");
        }
        Ok(())
    }

    fn write_period(&mut self) -> Result<(), RenderError> {
        let channels = self.device.channels();
        let mut offset = 0;
        while offset < self.period.len() {
            match self.device.write(&self.period[offset..]) {
                Ok(frames) => offset += frames * channels,
                Err(WriteError::Again) => continue,
                Err(WriteError::Underrun) => {
                    self.recover_underrun()?;
                    break;
                }
                Err(WriteError::Suspended) => {
                    self.recover_suspend()?;
                    break;
                }
                Err(WriteError::Failed(source)) => {
                    return Err(RenderError::Write(DeviceError::Stream {
                        operation: "write",
                        source,
                    }));
                }
            }
        }
        Ok(())
    }

    fn recover_underrun(&mut self) -> Result<(), RenderError> {
        log::warn!("underrun, preparing stream");
        self.device
            .prepare()
            .map_err(|e| RenderError::Underrun(stream_error("prepare")(e)))
    }

    fn recover_suspend(&mut self) -> Result<(), RenderError> {
        log::warn!("device suspended, waiting for resume");
        loop {
            match self.device.resume() {
                Ok(Resume::Resumed) => break,
                Ok(Resume::Pending) => thread::sleep(self.suspend_retry),
                Err(e) => {
                    log::debug!("resume failed: {e}");
                    break;
                }
            }
        }
        self.device
            .prepare()
            .map_err(|e| RenderError::Suspend(stream_error("prepare")(e)))
    }
}
