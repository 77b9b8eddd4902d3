//! Phase-accumulator sine generator writing interleaved signed 16-bit PCM.

use std::f64::consts::TAU;

/// Width of one sample in bits.
pub const SAMPLE_BITS: usize = 16;

/// Where one channel's samples live in an interleaved buffer.
///
/// Offsets are in bits, the way ALSA describes channel areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelArea {
    /// Bit offset of the channel's first sample.
    pub first: usize,
    /// Distance in bits between two consecutive samples of the channel.
    pub step: usize,
}

impl ChannelArea {
    /// Areas for `channels` interleaved 16-bit channels sharing one buffer.
    pub fn interleaved(channels: usize) -> Vec<ChannelArea> {
        (0..channels)
            .map(|channel| ChannelArea {
                first: channel * SAMPLE_BITS,
                step: channels * SAMPLE_BITS,
            })
            .collect()
    }

    fn first_index(&self) -> usize {
        self.first / SAMPLE_BITS
    }

    fn stride(&self) -> usize {
        self.step / SAMPLE_BITS
    }
}

/// Phase advance per frame for a tone of `frequency` Hz, folded into `[0, 2π)`.
///
/// Tones above the Nyquist frequency alias, but the phase still wraps with one subtraction.
pub fn phase_step(frequency: f64, sample_rate: u32) -> f64 {
    (TAU * frequency / f64::from(sample_rate)).rem_euclid(TAU)
}

/// Writes `frames` frames of `amplitude * sin(phase)` into every area of `buffer`.
///
/// `phase` is advanced by `step` per frame and wrapped back into `[0, 2π)` with a single subtraction.
/// `step` must come from [`phase_step`].
pub fn fill(
    buffer: &mut [i16],
    areas: &[ChannelArea],
    frames: usize,
    amplitude: i16,
    step: f64,
    phase: &mut f64,
) {
    let amplitude = f64::from(amplitude);
    let mut current = *phase;
    for frame in 0..frames {
        let sample = (amplitude * current.sin()).round() as i16;
        for area in areas {
            buffer[area.first_index() + frame * area.stride()] = sample;
        }
        current += step;
        if current >= TAU {
            current -= TAU;
        }
    }
    *phase = current;
}

/// Oscillator state owned by the renderer thread.
#[derive(Debug, Clone)]
pub struct Oscillator {
    areas: Vec<ChannelArea>,
    sample_rate: u32,
    frequency: f64,
    phase: f64,
    step: f64,
}

impl Oscillator {
    /// An oscillator for `channels` interleaved channels, starting at phase 0.
    pub fn new(channels: usize, sample_rate: u32, frequency: f64) -> Self {
        Self {
            areas: ChannelArea::interleaved(channels),
            sample_rate,
            frequency,
            phase: 0.0,
            step: phase_step(frequency, sample_rate),
        }
    }

    /// Retunes the oscillator. The phase is kept so the waveform stays continuous.
    pub fn set_frequency(&mut self, frequency: f64) {
        if frequency != self.frequency {
            self.frequency = frequency;
            self.step = phase_step(frequency, self.sample_rate);
        }
    }

    /// Fills `frames` interleaved frames of `buffer`.
    pub fn fill(&mut self, buffer: &mut [i16], frames: usize, amplitude: i16) {
        debug_assert!(buffer.len() >= frames * self.areas.len());
        fill(
            buffer,
            &self.areas,
            frames,
            amplitude,
            self.step,
            &mut self.phase,
        );
    }

    /// Current phase in radians.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Phase advance per frame at the current frequency.
    pub fn phase_step(&self) -> f64 {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn interleaved_areas() {
        assert_eq!(
            ChannelArea::interleaved(2),
            vec![
                ChannelArea { first: 0, step: 32 },
                ChannelArea { first: 16, step: 32 },
            ]
        );
    }

    #[test]
    fn writes_same_sample_to_every_channel() {
        let mut osc = Oscillator::new(3, 44100, 1000.0);
        let mut buffer = vec![0i16; 64 * 3];
        osc.fill(&mut buffer, 64, 32767);
        for frame in buffer.chunks(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[1], frame[2]);
        }
    }

    #[test]
    fn quarter_rate_tone_hits_known_values() {
        // A tone at a quarter of the rate visits 0, π/2, π, 3π/2.
        let mut osc = Oscillator::new(1, 48000, 12000.0);
        let mut buffer = vec![0i16; 8];
        osc.fill(&mut buffer, 8, 1000);
        assert_eq!(buffer, vec![0, 1000, 0, -1000, 0, 1000, 0, -1000]);
    }

    #[test]
    fn leaves_frames_beyond_count_untouched() {
        let mut osc = Oscillator::new(2, 44100, 440.0);
        let mut buffer = vec![7i16; 20];
        osc.fill(&mut buffer, 5, 32767);
        assert!(buffer[10..].iter().all(|&s| s == 7));
    }

    #[test]
    fn retuning_keeps_phase() {
        let mut osc = Oscillator::new(1, 44100, 440.0);
        let mut buffer = vec![0i16; 100];
        osc.fill(&mut buffer, 100, 32767);
        let phase = osc.phase();
        osc.set_frequency(880.0);
        assert_eq!(osc.phase(), phase);
        assert_eq!(osc.phase_step(), phase_step(880.0, 44100));
    }

    #[test]
    fn full_cycle_returns_to_start() {
        // 44100 / 441 = 100 frames per cycle.
        let mut osc = Oscillator::new(1, 44100, 441.0);
        let mut buffer = vec![0i16; 100];
        osc.fill(&mut buffer, 100, 32767);
        let distance = osc.phase().min(TAU - osc.phase());
        assert!(distance < osc.phase_step());
    }

    #[test]
    fn top_key_at_lowest_rate_stays_wrapped() {
        // C8 at 4 kHz advances more than a full turn per frame.
        let mut osc = Oscillator::new(1, 4000, 4186.009);
        assert!(osc.phase_step() < TAU);
        let mut buffer = vec![0i16; 1000];
        osc.fill(&mut buffer, 1000, 32767);
        assert!((0.0..TAU).contains(&osc.phase()));
    }

    proptest! {
        #[test]
        fn deterministic(
            amplitude in 0i16..=i16::MAX,
            frequency in 20.0f64..4000.0,
            start in 0.0f64..TAU,
            frames in 1usize..512,
        ) {
            let areas = ChannelArea::interleaved(2);
            let step = phase_step(frequency, 44100);
            let mut first = vec![0i16; frames * 2];
            let mut second = vec![0i16; frames * 2];
            let (mut a, mut b) = (start, start);
            fill(&mut first, &areas, frames, amplitude, step, &mut a);
            fill(&mut second, &areas, frames, amplitude, step, &mut b);
            prop_assert_eq!(first, second);
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }

        #[test]
        fn phase_stays_wrapped(
            frequency in 20.0f64..4186.01,
            sample_rate in 4000u32..=96000,
            frames in 1usize..4096,
        ) {
            let mut osc = Oscillator::new(1, sample_rate, frequency);
            let mut buffer = vec![0i16; frames];
            osc.fill(&mut buffer, frames, 100);
            prop_assert!((0.0..TAU).contains(&osc.phase()));
        }

        #[test]
        fn silence_is_all_zeros(
            frequency in 20.0f64..4000.0,
            channels in 1usize..=24,
            frames in 1usize..256,
        ) {
            let mut osc = Oscillator::new(channels, 44100, frequency);
            let mut buffer = vec![1i16; frames * channels];
            osc.fill(&mut buffer, frames, 0);
            prop_assert!(buffer.iter().all(|&s| s == 0));
        }

        #[test]
        fn peak_never_exceeds_amplitude(
            amplitude in 0i16..=i16::MAX,
            frequency in 20.0f64..4000.0,
        ) {
            let mut osc = Oscillator::new(1, 44100, frequency);
            let mut buffer = vec![0i16; 1024];
            osc.fill(&mut buffer, 1024, amplitude);
            prop_assert!(buffer.iter().all(|s| s.unsigned_abs() <= amplitude.unsigned_abs()));
        }
    }
}
