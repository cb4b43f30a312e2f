//! Spectral frame producer.
//!
//! Mirrors a browser analyser node: the audio thread keeps the most recent
//! `fft_size` samples in a [`WindowTap`] and publishes them through the
//! mailbox; the detector thread turns the latest window into a smoothed dB
//! spectrum on demand with [`SpectralProducer::poll`].
//!
//! ```text
//! audio thread:     quantum ─▶ WindowTap ─▶ mailbox (latest window)
//! detector thread:  poll(now) ─▶ Blackman ─▶ FFT ─▶ |X|/N ─▶ smooth ─▶ dB
//! ```

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::audio::buffer::RingBuffer;
use crate::audio::level::amplitude_to_db;
use crate::audio::mailbox::{MailboxReceiver, MailboxSender};

// ---------------------------------------------------------------------------
// SpectralFrame
// ---------------------------------------------------------------------------

/// One analysed window.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    /// Smoothed magnitude per bin in dB, `fft_size / 2` bins.
    pub frequency_db: Vec<f32>,
    /// The `fft_size` time-domain samples the spectrum was computed from.
    pub time_domain: Vec<f32>,
}

// ---------------------------------------------------------------------------
// SpectrumAnalyser
// ---------------------------------------------------------------------------

/// Windowed FFT with exponential smoothing across calls.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    /// Smoothed linear magnitudes carried between frames.
    smoothed: Vec<f32>,
    smoothing: f32,
}

impl SpectrumAnalyser {
    /// Blackman window coefficient.
    const ALPHA: f32 = 0.16;

    /// `fft_size` must be a power of two; `smoothing` in `[0, 1)` weights the
    /// previous frame.
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            window: blackman_window(fft_size, Self::ALPHA),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
            smoothing,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Analyse `time` (exactly `fft_size` samples) and write `fft_size / 2`
    /// dB magnitudes into `out`.
    pub fn analyse(&mut self, time: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(time.len(), self.window.len());
        let n = self.window.len();

        for ((slot, &s), &w) in self.scratch.iter_mut().zip(time).zip(&self.window) {
            *slot = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.smoothing;
        out.clear();
        for (k, prev) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() / n as f32;
            *prev = tau * *prev + (1.0 - tau) * magnitude;
            out.push(amplitude_to_db(*prev));
        }
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

fn blackman_window(n: usize, alpha: f32) -> Vec<f32> {
    let a0 = (1.0 - alpha) / 2.0;
    let a1 = 0.5;
    let a2 = alpha / 2.0;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// WindowTap  (audio thread)
// ---------------------------------------------------------------------------

/// Audio-thread half of the spectral path: keeps the latest `fft_size`
/// native-rate samples and, after every quantum, copies them into a pooled
/// buffer from the mailbox and publishes it.  Nothing is allocated here.
pub struct WindowTap {
    window: RingBuffer<f32>,
    tx: MailboxSender<Vec<f32>>,
}

impl WindowTap {
    /// `tx` should come from [`window_mailbox`](crate::audio::mailbox::window_mailbox);
    /// when no spare buffer is free the quantum is still recorded but not
    /// published.
    pub fn new(fft_size: usize, tx: MailboxSender<Vec<f32>>) -> Self {
        Self {
            window: RingBuffer::new(fft_size),
            tx,
        }
    }

    pub fn process(&mut self, quantum: &[f32]) {
        if quantum.is_empty() {
            return;
        }
        self.window.push_slice(quantum);
        if let Some(mut buf) = self.tx.acquire() {
            buf.resize(self.window.capacity(), 0.0);
            self.window.snapshot_into(&mut buf);
            self.tx.publish(buf);
        }
    }
}

// ---------------------------------------------------------------------------
// SpectralProducer  (detector thread)
// ---------------------------------------------------------------------------

/// Detector-thread half of the spectral path.
///
/// The frame interval is a soft floor: polls that arrive sooner are
/// coalesced and produce nothing, and no backlog builds up.  When no new
/// window arrived since the previous frame the last one is analysed again.
pub struct SpectralProducer {
    rx: MailboxReceiver<Vec<f32>>,
    latest: Vec<f32>,
    analyser: SpectrumAnalyser,
    interval: Duration,
    last_frame: Option<Instant>,
}

impl SpectralProducer {
    pub fn new(
        rx: MailboxReceiver<Vec<f32>>,
        fft_size: usize,
        smoothing: f32,
        interval: Duration,
    ) -> Self {
        Self {
            rx,
            latest: vec![0.0; fft_size],
            analyser: SpectrumAnalyser::new(fft_size, smoothing),
            interval,
            last_frame: None,
        }
    }

    /// Produce a frame if at least `interval` passed since the previous one.
    pub fn poll(&mut self, now: Instant) -> Option<SpectralFrame> {
        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_frame = Some(now);

        if let Some(window) = self.rx.take() {
            if window.len() == self.latest.len() {
                let previous = std::mem::replace(&mut self.latest, window);
                self.rx.recycle(previous);
            } else {
                self.rx.recycle(window);
            }
        }

        let mut frequency_db = Vec::with_capacity(self.latest.len() / 2);
        self.analyser.analyse(&self.latest, &mut frequency_db);
        Some(SpectralFrame {
            frequency_db,
            time_domain: self.latest.clone(),
        })
    }

    /// Restart the cadence so the next poll produces a frame immediately.
    pub fn reset(&mut self) {
        self.last_frame = None;
        self.analyser.reset();
        self.rx.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mailbox::{mailbox, window_mailbox, WINDOW_BUFFERS};

    fn tone(freqs: &[(f32, f32)], sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                freqs
                    .iter()
                    .map(|&(f, a)| a * (2.0 * PI * f * t).sin())
                    .sum()
            })
            .collect()
    }

    fn peak_bin(db: &[f32]) -> usize {
        db.iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn blackman_window_is_zero_at_edges() {
        let w = blackman_window(64, 0.16);
        assert!(w[0].abs() < 1e-6);
        assert!((w[32] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn analyser_finds_tone_bin() {
        // 1 kHz at 16 kHz with N = 512 → 31.25 Hz/bin → bin 32.
        let mut analyser = SpectrumAnalyser::new(512, 0.0);
        let mut out = Vec::new();
        analyser.analyse(&tone(&[(1000.0, 0.8)], 16_000, 512), &mut out);
        assert_eq!(out.len(), 256);
        assert_eq!(peak_bin(&out), 32);
    }

    #[test]
    fn analyser_silence_is_floor() {
        let mut analyser = SpectrumAnalyser::new(256, 0.1);
        let mut out = Vec::new();
        analyser.analyse(&[0.0; 256], &mut out);
        assert!(out.iter().all(|&db| db == -100.0));
    }

    #[test]
    fn smoothing_carries_previous_frame() {
        let input = tone(&[(1000.0, 0.8)], 16_000, 512);
        let mut smoothed = SpectrumAnalyser::new(512, 0.5);
        let mut raw = SpectrumAnalyser::new(512, 0.0);
        let (mut a, mut b) = (Vec::new(), Vec::new());

        smoothed.analyse(&input, &mut a);
        raw.analyse(&input, &mut b);
        // Half of the first frame's magnitude: about -6 dB relative.
        assert!((b[32] - a[32] - 6.02).abs() < 0.05);

        smoothed.reset();
        smoothed.analyse(&input, &mut a);
        assert!((b[32] - a[32] - 6.02).abs() < 0.05);
    }

    #[test]
    fn producer_coalesces_fast_polls() {
        let (tx, rx) = window_mailbox(256);
        let mut tap = WindowTap::new(256, tx);
        let mut producer = SpectralProducer::new(rx, 256, 0.1, Duration::from_millis(30));
        let t0 = Instant::now();

        tap.process(&[0.1; 128]);
        assert!(producer.poll(t0).is_some());
        assert!(producer.poll(t0 + Duration::from_millis(10)).is_none());
        assert!(producer.poll(t0 + Duration::from_millis(29)).is_none());
        assert!(producer.poll(t0 + Duration::from_millis(30)).is_some());
        // The next floor counts from the last produced frame, not a grid.
        assert!(producer.poll(t0 + Duration::from_millis(59)).is_none());
        assert!(producer.poll(t0 + Duration::from_millis(100)).is_some());
    }

    #[test]
    fn producer_reflects_most_recent_window() {
        let (tx, rx) = window_mailbox(4);
        let mut tap = WindowTap::new(4, tx);
        let mut producer = SpectralProducer::new(rx, 4, 0.0, Duration::ZERO);
        let t0 = Instant::now();

        tap.process(&[1.0, 2.0]);
        tap.process(&[3.0, 4.0, 5.0]);
        let frame = producer.poll(t0).unwrap();
        assert_eq!(frame.time_domain, vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(frame.frequency_db.len(), 2);

        // Nothing new published: the same window is analysed again.
        let again = producer.poll(t0 + Duration::from_millis(1)).unwrap();
        assert_eq!(again.time_domain, frame.time_domain);
    }

    #[test]
    fn tap_and_producer_share_a_fixed_buffer_pool() {
        let (tx, rx) = window_mailbox(8);
        let mut tap = WindowTap::new(8, tx);
        let mut producer = SpectralProducer::new(rx, 8, 0.0, Duration::ZERO);
        let t0 = Instant::now();
        let mut addrs = Vec::new();

        for i in 0..50 {
            // Several quanta per frame, as on a real device.
            for j in 0..3 {
                tap.process(&[(i * 3 + j) as f32]);
            }
            let frame = producer.poll(t0 + Duration::from_millis(i)).unwrap();
            assert_eq!(frame.time_domain[7], (i * 3 + 2) as f32);
            addrs.push(producer.latest.as_ptr() as usize);
        }
        addrs.sort_unstable();
        addrs.dedup();
        // The pool plus the producer's initial silent window.
        assert!(addrs.len() <= WINDOW_BUFFERS + 1);
    }

    #[test]
    fn tap_without_spare_buffers_publishes_nothing() {
        let (tx, rx) = mailbox();
        let mut tap = WindowTap::new(4, tx);
        tap.process(&[1.0; 4]);
        assert!(rx.take().is_none());
    }
}
