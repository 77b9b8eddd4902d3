//! Synthesis state shared between the MIDI listener and the renderer.
//!
//! The listener publishes a whole [`Snapshot`] at once and the renderer loads it once per period, so
//! frequency and amplitude are always observed as a consistent pair. Loads never take a lock. The
//! mutex/condvar pair exists only so an idle renderer can sleep until there is something to play.

use std::sync::{
    Arc, Condvar, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use arc_swap::ArcSwap;

/// Maximum value of a 16-bit signal.
pub const MAX_AMPLITUDE: i16 = i16::MAX;

/// Frequency the synthesizer is tuned to before the first note (A4).
pub const DEFAULT_FREQUENCY: f64 = 440.0;

/// What the renderer should be playing right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Oscillator frequency in Hz.
    pub frequency: f64,
    /// Peak sample value; `0` is silence.
    pub amplitude: i16,
}

impl Snapshot {
    /// Whether there is nothing to play.
    pub fn is_silent(&self) -> bool {
        self.amplitude == 0
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            amplitude: 0,
        }
    }
}

/// Shared, atomically exchanged synthesis state.
#[derive(Debug)]
pub struct SynthState {
    current: ArcSwap<Snapshot>,
    shutdown: AtomicBool,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl SynthState {
    /// A silent state tuned to [`DEFAULT_FREQUENCY`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The latest published pair.
    pub fn snapshot(&self) -> Snapshot {
        **self.current.load()
    }

    /// Frequency and amplitude as a tuple.
    pub fn read_both(&self) -> (f64, i16) {
        let snapshot = self.snapshot();
        (snapshot.frequency, snapshot.amplitude)
    }

    /// Publishes frequency and amplitude together.
    pub fn set_note(&self, frequency: f64, amplitude: i16) {
        self.publish(Snapshot {
            frequency,
            amplitude,
        });
    }

    /// Retunes without touching the amplitude.
    pub fn set_frequency(&self, frequency: f64) {
        self.update(|snapshot| Snapshot {
            frequency,
            ..snapshot
        });
    }

    /// Changes the amplitude, keeping the frequency.
    pub fn set_amplitude(&self, amplitude: i16) {
        self.update(|snapshot| Snapshot {
            amplitude,
            ..snapshot
        });
    }

    /// Blocks until something audible is published or the state is shut down.
    ///
    /// Returns `None` on shutdown.
    pub fn wait_for_sound(&self) -> Option<Snapshot> {
        let mut guard = self.lock();
        loop {
            if self.is_shut_down() {
                return None;
            }
            let snapshot = self.snapshot();
            if !snapshot.is_silent() {
                return Some(snapshot);
            }
            guard = self.wake.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Releases every waiter; renderers observing this stop their loop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify();
    }

    /// Whether [`Self::shutdown`] was called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn update(&self, f: impl Fn(Snapshot) -> Snapshot) {
        self.current.rcu(|current| f(**current));
        self.notify();
    }

    fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
        self.notify();
    }

    // Taking the lock after the store closes the window between a waiter's check and its wait.
    fn notify(&self) {
        drop(self.lock());
        self.wake.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.wake_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SynthState {
    fn default() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            shutdown: AtomicBool::new(false),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
        }
    }
}
