//! Audio front end — microphone capture → frame producers.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → stereo_to_mono ─┬─▶ WindowTap ──────────▶ mailbox → SpectralProducer
//!                                              └─▶ ResamplingProducer ─▶ mailbox → learned classifier
//! ```
//!
//! Everything left of the mailbox runs on the audio thread and never blocks
//! or allocates: windows are copied into buffers the mailbox pre-allocates
//! and the consumer recycles.  The mailbox holds only the latest window.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vowel_detect::audio::{window_mailbox, AudioSource, CpalSource, ResamplingProducer};
//!
//! let (tx, rx) = window_mailbox(3_360);
//! let mut mic = CpalSource::new(None);
//! let info = mic.initialize().unwrap();
//! let mut producer =
//!     ResamplingProducer::new(info.sample_rate, 16_000, 3_360, Duration::from_millis(40), tx);
//! mic.start(Box::new(move |quantum: &[f32]| producer.process(quantum))).unwrap();
//!
//! loop {
//!     if let Some(window) = rx.take() {
//!         println!("window of {} samples @ 16 kHz", window.len());
//!         rx.recycle(window);
//!     }
//!     std::thread::sleep(Duration::from_millis(16));
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod level;
pub mod mailbox;
pub mod resample;
pub mod spectrum;

pub use buffer::RingBuffer;
pub use capture::{samples_to_f32, AudioSink, AudioSource, CaptureError, CpalSource, StreamInfo};
pub use mailbox::{
    mailbox, mailbox_with_spares, window_mailbox, MailboxReceiver, MailboxSender, WINDOW_BUFFERS,
};
pub use resample::{resample, stereo_to_mono, ResamplingProducer};
pub use spectrum::{SpectralFrame, SpectralProducer, SpectrumAnalyser, WindowTap};
