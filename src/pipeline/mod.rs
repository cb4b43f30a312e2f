//! Detector orchestrator module.
//!
//! This module wires microphone capture, the mode-specific frame producer,
//! the classifier, the stability filter and the subscriber callbacks, and
//! exposes the observable state a UI or game loop reads.
//!
//! # Architecture
//!
//! ```text
//! AudioSource (cpal thread)
//!        │ quanta
//!        ▼
//! WindowTap / ResamplingProducer ──▶ mailbox (latest window only)
//!                                        │
//! VowelDetector::run()  ← tokio interval, 16 ms
//!        │
//!        └─ tick(now)
//!              ├─ Spectral: SpectralProducer::poll → GeometricClassifier
//!              ├─ Learned:  mailbox.take → LearnedClassifier (log-mel CNN) → recycle
//!              ├─ StabilityFilter
//!              └─ EventEmitter → on_vowel_detected / on_silence / on_silence_timeout / on_error
//!
//! watch::Sender<DetectorStatus> ───▶ subscribe() receivers
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vowel_detect::audio::CpalSource;
//! use vowel_detect::config::{DetectorConfig, DetectorMode};
//! use vowel_detect::model::SafetensorsLoader;
//! use vowel_detect::pipeline::VowelDetector;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = DetectorConfig::builder()
//!         .mode(DetectorMode::Learned)
//!         .build()
//!         .unwrap();
//!     let source = CpalSource::new(Some(config.sample_rate));
//!     let mut detector =
//!         VowelDetector::new(config, Box::new(source), Arc::new(SafetensorsLoader)).unwrap();
//!
//!     detector.on_vowel_detected(|vowel, _| println!("{vowel}"));
//!     detector.on_silence_timeout(|elapsed| println!("quiet for {elapsed:?}"));
//!
//!     let status = detector.subscribe();
//!     detector.start().await.unwrap();
//!     detector.run(tokio::signal::ctrl_c()).await;
//!     println!("last state: {}", status.borrow().label());
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{DetectorError, VowelDetector, TICK_INTERVAL};
pub use state::{AudioDiagnostics, DebugFrame, DetectorStatus};
