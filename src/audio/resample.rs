//! Channel mixing, linear resampling and the resampling frame producer.
//!
//! The learned model expects fixed-length **16 kHz mono `f32`** windows.
//! [`ResamplingProducer`] runs inside the audio callback: it resamples every
//! quantum from the device rate to the target rate, writes the result into a
//! [`RingBuffer`] and, about every `publish_interval` of input, copies a
//! chronological snapshot into a pooled buffer and publishes it through the
//! [`mailbox`](crate::audio::mailbox).
//!
//! Resampling is plain linear interpolation; at these window lengths the
//! aliasing it introduces is below what the model is sensitive to.

use crate::audio::buffer::RingBuffer;
use crate::audio::mailbox::MailboxSender;

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono into `out`, averaging all
/// channels.  `out` is cleared first so the caller can reuse it across
/// callbacks without reallocating.
///
/// * `channels == 1` copies the input unchanged.
/// * `channels == 0` leaves `out` empty.
///
/// ```rust
/// use vowel_detect::audio::stereo_to_mono;
///
/// let mut mono = Vec::new();
/// stereo_to_mono(&[0.5_f32, -0.5, 0.2, 0.4], 2, &mut mono);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16, out: &mut Vec<f32>) {
    out.clear();
    match channels {
        0 => {}
        1 => out.extend_from_slice(samples),
        n => {
            let n = n as usize;
            out.extend(
                samples
                    .chunks_exact(n)
                    .map(|frame| frame.iter().sum::<f32>() / n as f32),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Linear resampling
// ---------------------------------------------------------------------------

/// Number of output samples produced for `input_len` input samples at
/// `ratio = target_rate / source_rate`: `ceil(input_len * ratio)`.
pub fn output_len(input_len: usize, ratio: f64) -> usize {
    (input_len as f64 * ratio).ceil() as usize
}

/// Resample `samples` by `ratio` (`target_rate / source_rate`), passing each
/// output sample to `emit` in order.
///
/// Output sample `i` sits at source position `i / ratio` and is linearly
/// interpolated between the two bracketing input samples.  Positions at or
/// beyond the last input sample take the last sample's value.
pub fn resample_linear_with(samples: &[f32], ratio: f64, mut emit: impl FnMut(f32)) {
    if samples.is_empty() || ratio <= 0.0 {
        return;
    }
    let last = samples.len() - 1;

    for i in 0..output_len(samples.len(), ratio) {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx >= last {
            samples[last]
        } else {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        };
        emit(sample);
    }
}

/// Resample `samples` from `source_rate` Hz to `target_rate` Hz.
///
/// ```rust
/// use vowel_detect::audio::resample;
///
/// // 10 ms @ 48 kHz → 10 ms @ 16 kHz
/// let lo = resample(&vec![0.5_f32; 480], 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }
    if source_rate == 0 {
        return Vec::new();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let mut out = Vec::with_capacity(output_len(samples.len(), ratio));
    resample_linear_with(samples, ratio, |s| out.push(s));
    out
}

// ---------------------------------------------------------------------------
// ResamplingProducer
// ---------------------------------------------------------------------------

/// Audio-thread half of the resampling path.
///
/// Owns the circular window exclusively.  [`process`](Self::process) is
/// called once per callback and does a bounded amount of work: the
/// interpolation loop, plus one copy into a pooled buffer whenever
/// `publish_interval` worth of native-rate input has arrived since the last
/// snapshot.  Cadence is measured in input samples, so callbacks of varying
/// length publish on the same clock.
pub struct ResamplingProducer {
    ratio: f64,
    window: RingBuffer<f32>,
    samples_per_publish: usize,
    samples_since_publish: usize,
    tx: MailboxSender<Vec<f32>>,
}

impl ResamplingProducer {
    /// * `native_rate` — device rate the quanta arrive at.
    /// * `target_rate` — rate of the published snapshots.
    /// * `window_samples` — snapshot length in target-rate samples.
    /// * `publish_interval` — time between snapshots; zero publishes after
    ///   every quantum.
    /// * `tx` — should come from [`window_mailbox`](crate::audio::mailbox::window_mailbox)
    ///   so spare buffers exist; with no spare free a snapshot is skipped.
    pub fn new(
        native_rate: u32,
        target_rate: u32,
        window_samples: usize,
        publish_interval: std::time::Duration,
        tx: MailboxSender<Vec<f32>>,
    ) -> Self {
        let samples_per_publish =
            (publish_interval.as_secs_f64() * native_rate as f64).round() as usize;
        Self {
            ratio: target_rate as f64 / native_rate.max(1) as f64,
            window: RingBuffer::new(window_samples),
            samples_per_publish,
            samples_since_publish: 0,
            tx,
        }
    }

    /// Resample one mono quantum into the window and publish a snapshot when
    /// due.  Empty quanta are ignored.
    pub fn process(&mut self, quantum: &[f32]) {
        if quantum.is_empty() {
            return;
        }

        let window = &mut self.window;
        resample_linear_with(quantum, self.ratio, |s| window.push(s));

        self.samples_since_publish += quantum.len();
        if self.samples_since_publish < self.samples_per_publish {
            return;
        }
        // A long callback may cover several intervals; one snapshot of the
        // newest window stands in for all of them.
        self.samples_since_publish = 0;

        if let Some(mut buf) = self.tx.acquire() {
            buf.resize(self.window.capacity(), 0.0);
            self.window.snapshot_into(&mut buf);
            self.tx.publish(buf);
        }
    }

    /// `target_rate / native_rate`.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Native-rate input samples between two snapshots.
    pub fn samples_per_publish(&self) -> usize {
        self.samples_per_publish
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mailbox::{mailbox, window_mailbox, WINDOW_BUFFERS};
    use std::time::Duration;

    // ---- stereo_to_mono ----------------------------------------------------

    #[test]
    fn stereo_to_mono_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        let mut out = vec![9.0];
        stereo_to_mono(&input, 1, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn stereo_to_mono_four_channel() {
        let mut out = Vec::new();
        stereo_to_mono(&[0.4_f32; 8], 4, &mut out);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn stereo_to_mono_zero_channels() {
        let mut out = vec![1.0];
        stereo_to_mono(&[1.0_f32, 2.0], 0, &mut out);
        assert!(out.is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn resample_preserves_duration() {
        // T seconds at R_in → ceil(T·R_in·ratio) samples, within one of T·R_out.
        for (rate_in, secs) in [(44_100_u32, 1.0_f64), (48_000, 0.21), (22_050, 0.5), (8_000, 0.75)] {
            let input = vec![0.0_f32; (rate_in as f64 * secs).round() as usize];
            let out = resample(&input, rate_in, 16_000);
            let ratio = 16_000.0 / rate_in as f64;
            assert_eq!(out.len(), output_len(input.len(), ratio));
            let ideal = secs * 16_000.0;
            assert!(
                (out.len() as f64 - ideal).abs() <= 1.0,
                "{rate_in} Hz: expected ~{ideal}, got {}",
                out.len()
            );
        }
    }

    #[test]
    fn resample_constant_signal_preserves_amplitude() {
        let out = resample(&vec![0.5_f32; 441], 44_100, 16_000);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn resample_interpolates_between_samples() {
        // Upsampling ×2: odd outputs fall halfway between inputs.
        let out = resample(&[0.0_f32, 1.0, 2.0], 8_000, 16_000);
        assert_eq!(out.len(), 6);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 1.5).abs() < 1e-6);
        // Positions past the last sample clamp to it.
        assert_eq!(out[4], 2.0);
        assert_eq!(out[5], 2.0);
    }

    // ---- ResamplingProducer ------------------------------------------------

    #[test]
    fn producer_publishes_every_interval() {
        let (tx, rx) = window_mailbox(3_360);
        // 40 ms at 48 kHz = 1920 native samples = 15 quanta of 128.
        let mut producer =
            ResamplingProducer::new(48_000, 16_000, 3_360, Duration::from_millis(40), tx);
        assert_eq!(producer.samples_per_publish(), 1_920);

        for _ in 0..14 {
            producer.process(&[0.25; 128]);
        }
        assert!(rx.take().is_none());

        producer.process(&[0.25; 128]);
        let snapshot = rx.take().expect("snapshot after 40 ms of input");
        assert_eq!(snapshot.len(), 3_360);
        // 15 quanta × ceil(128/3) = 15 × 43 = 645 resampled samples, newest last.
        assert!(snapshot[..3_360 - 645].iter().all(|&s| s == 0.0));
        assert!(snapshot[3_360 - 645..].iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn uneven_callbacks_keep_the_publish_clock() {
        let (tx, rx) = window_mailbox(3_360);
        let mut producer =
            ResamplingProducer::new(48_000, 16_000, 3_360, Duration::from_millis(40), tx);

        // A short first callback must not stretch the cadence.
        producer.process(&[0.1; 16]);
        let mut elapsed_samples = 16;
        let mut first_snapshot_at = None;
        for _ in 0..40 {
            producer.process(&[0.1; 480]);
            elapsed_samples += 480;
            if let Some(window) = rx.take() {
                first_snapshot_at.get_or_insert(elapsed_samples);
                rx.recycle(window);
            }
        }
        let at = first_snapshot_at.expect("snapshot published");
        let ms = at as f64 / 48.0;
        assert!(ms <= 50.0, "first snapshot after {ms} ms");

        // Mixed sizes: every snapshot lands within one callback of 40 ms.
        let mut since = 0;
        let mut published = 0;
        for len in [128, 1_024, 64, 480, 960, 256, 2_048, 128, 512, 1_000].repeat(4) {
            producer.process(&vec![0.1; len]);
            since += len;
            if let Some(window) = rx.take() {
                assert!(since >= 1_920 && since < 1_920 + 2_048, "published after {since}");
                since = 0;
                published += 1;
                rx.recycle(window);
            }
        }
        assert_eq!(published, 8);
    }

    #[test]
    fn producer_snapshot_is_chronological_after_wrap() {
        let (tx, rx) = window_mailbox(4);
        // Same rate: samples pass through unchanged; publish every quantum.
        let mut producer = ResamplingProducer::new(16_000, 16_000, 4, Duration::ZERO, tx);

        producer.process(&[1.0, 2.0, 3.0]);
        producer.process(&[4.0, 5.0, 6.0]);
        assert_eq!(rx.take(), Some(vec![3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn producer_overwrites_unconsumed_snapshot() {
        let (tx, rx) = window_mailbox(2);
        let mut producer = ResamplingProducer::new(16_000, 16_000, 2, Duration::ZERO, tx);

        producer.process(&[1.0]);
        producer.process(&[2.0]);
        producer.process(&[3.0]);
        // Only the latest window is visible; older snapshots were replaced.
        assert_eq!(rx.take(), Some(vec![2.0, 3.0]));
        assert_eq!(rx.take(), None);
    }

    #[test]
    fn producer_reuses_pooled_buffers() {
        let (tx, rx) = window_mailbox(4);
        let mut producer = ResamplingProducer::new(16_000, 16_000, 4, Duration::ZERO, tx);
        let mut addrs = Vec::new();

        for i in 0..20 {
            producer.process(&[i as f32]);
            let window = rx.take().unwrap();
            assert_eq!(window[3], i as f32);
            addrs.push(window.as_ptr() as usize);
            rx.recycle(window);
        }
        addrs.sort_unstable();
        addrs.dedup();
        assert!(addrs.len() <= WINDOW_BUFFERS);
    }

    #[test]
    fn producer_skips_snapshot_without_spare_buffer() {
        let (tx, rx) = mailbox();
        let mut producer = ResamplingProducer::new(16_000, 16_000, 4, Duration::ZERO, tx);
        producer.process(&[1.0, 2.0]);
        assert!(rx.take().is_none());
    }

    #[test]
    fn producer_ignores_empty_quanta() {
        let (tx, rx) = window_mailbox(16);
        let mut producer = ResamplingProducer::new(44_100, 16_000, 16, Duration::ZERO, tx);
        producer.process(&[]);
        assert!(rx.take().is_none());
    }
}
