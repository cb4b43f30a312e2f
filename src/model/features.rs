//! Log-mel front end of the learned model.
//!
//! ```text
//! 16 kHz window ─▶ frames (400 / hop 160) ─▶ periodic Hann ─▶ 512-pt FFT ─▶ |X|
//!               ─▶ 40 HTK mel bands (0–8 kHz) ─▶ ln(mel + 1e-6) ─▶ [time, mels]
//! ```
//!
//! A 3 360-sample window gives 19 frames.  Trailing samples that do not fill
//! a whole frame are dropped.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Rate the front end (and the network behind it) expects.
pub const SAMPLE_RATE: u32 = 16_000;
/// 25 ms analysis frame.
pub const FRAME_LENGTH: usize = 400;
/// 10 ms hop.
pub const FRAME_STEP: usize = 160;
pub const FFT_LENGTH: usize = 512;
pub const N_MELS: usize = 40;

const SPECTRUM_BINS: usize = FFT_LENGTH / 2 + 1;
const UPPER_EDGE_HZ: f32 = 8_000.0;
const LOG_OFFSET: f32 = 1e-6;

/// Number of whole frames in `samples` input samples.
pub fn frame_count(samples: usize) -> usize {
    if samples < FRAME_LENGTH {
        0
    } else {
        1 + (samples - FRAME_LENGTH) / FRAME_STEP
    }
}

/// Input samples needed for `frames` whole frames.
pub fn samples_for_frames(frames: usize) -> usize {
    match frames {
        0 => 0,
        n => FRAME_LENGTH + (n - 1) * FRAME_STEP,
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

/// Triangular filters, row-major `[N_MELS][SPECTRUM_BINS]`, with edges evenly
/// spaced on the mel scale.  The DC bin carries no weight.
fn mel_filterbank() -> Vec<f32> {
    let nyquist = SAMPLE_RATE as f32 / 2.0;
    let low = hz_to_mel(0.0);
    let step = (hz_to_mel(UPPER_EDGE_HZ) - low) / (N_MELS + 1) as f32;

    let mut weights = vec![0.0; N_MELS * SPECTRUM_BINS];
    for bin in 1..SPECTRUM_BINS {
        let mel = hz_to_mel(nyquist * bin as f32 / (SPECTRUM_BINS - 1) as f32);
        for band in 0..N_MELS {
            let lower = low + step * band as f32;
            let centre = lower + step;
            let upper = centre + step;
            let rising = (mel - lower) / (centre - lower);
            let falling = (upper - mel) / (upper - centre);
            weights[band * SPECTRUM_BINS + bin] = rising.min(falling).max(0.0);
        }
    }
    weights
}

fn periodic_hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

// ---------------------------------------------------------------------------
// LogMelFrontEnd
// ---------------------------------------------------------------------------

/// Turns a 16 kHz window into log-mel features.  Holds its FFT plan and
/// scratch buffers so repeated calls do not allocate.
pub struct LogMelFrontEnd {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    filterbank: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    magnitude: Vec<f32>,
}

impl LogMelFrontEnd {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(FFT_LENGTH),
            window: periodic_hann(FRAME_LENGTH),
            filterbank: mel_filterbank(),
            scratch: vec![Complex::new(0.0, 0.0); FFT_LENGTH],
            magnitude: vec![0.0; SPECTRUM_BINS],
        }
    }

    /// Write `frames × N_MELS` features for `samples` into `out` (time-major)
    /// and return the frame count.
    pub fn compute(&mut self, samples: &[f32], out: &mut Vec<f32>) -> usize {
        let frames = frame_count(samples.len());
        out.clear();
        out.reserve(frames * N_MELS);

        for frame in samples.windows(FRAME_LENGTH).step_by(FRAME_STEP) {
            for (slot, (&s, &w)) in self.scratch.iter_mut().zip(frame.iter().zip(&self.window)) {
                *slot = Complex::new(s * w, 0.0);
            }
            self.scratch[FRAME_LENGTH..].fill(Complex::new(0.0, 0.0));
            self.fft.process(&mut self.scratch);

            for (m, c) in self.magnitude.iter_mut().zip(&self.scratch) {
                *m = c.norm();
            }
            for filter in self.filterbank.chunks_exact(SPECTRUM_BINS) {
                let energy: f32 = filter.iter().zip(&self.magnitude).map(|(w, m)| w * m).sum();
                out.push((energy + LOG_OFFSET).ln());
            }
        }
        frames
    }
}

impl Default for LogMelFrontEnd {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn loudest_band(frame: &[f32]) -> usize {
        frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn frame_arithmetic() {
        assert_eq!(frame_count(3_360), 19);
        assert_eq!(frame_count(399), 0);
        assert_eq!(frame_count(400), 1);
        assert_eq!(frame_count(559), 1);
        assert_eq!(frame_count(560), 2);
        assert_eq!(samples_for_frames(4), 880);
        assert_eq!(frame_count(samples_for_frames(19)), 19);
    }

    #[test]
    fn filterbank_is_triangular_and_ignores_dc() {
        let fb = mel_filterbank();
        for filter in fb.chunks_exact(SPECTRUM_BINS) {
            assert_eq!(filter[0], 0.0);
            let peak = filter.iter().copied().fold(0.0, f32::max);
            assert!(peak > 0.0 && peak <= 1.0, "peak {peak}");
            assert!(filter.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn silence_sits_at_the_log_floor() {
        let mut fe = LogMelFrontEnd::new();
        let mut out = Vec::new();
        assert_eq!(fe.compute(&vec![0.0; 3_360], &mut out), 19);
        assert_eq!(out.len(), 19 * N_MELS);
        let floor = LOG_OFFSET.ln();
        assert!(out.iter().all(|&v| (v - floor).abs() < 1e-4));
    }

    #[test]
    fn tone_energy_lands_in_matching_band() {
        let mut fe = LogMelFrontEnd::new();
        let mut out = Vec::new();

        fe.compute(&tone(1_000.0, 3_360), &mut out);
        for frame in out.chunks_exact(N_MELS) {
            assert!((13..=14).contains(&loudest_band(frame)));
        }

        fe.compute(&tone(300.0, 3_360), &mut out);
        for frame in out.chunks_exact(N_MELS) {
            assert!((4..=5).contains(&loudest_band(frame)));
            assert!(frame[loudest_band(frame)] > 3.0);
        }
    }

    #[test]
    fn short_input_yields_no_frames() {
        let mut fe = LogMelFrontEnd::new();
        let mut out = vec![1.0; 8];
        assert_eq!(fe.compute(&[0.1; 200], &mut out), 0);
        assert!(out.is_empty());
    }
}
