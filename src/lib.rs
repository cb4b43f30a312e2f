//! Real-time vowel detection from a live microphone.
//!
//! ```text
//! AudioSource (cpal) ──▶ FrameProducer ──▶ Geometric | Learned classifier
//!                                               │
//!                                               ▼
//!                         StabilityFilter ──▶ EventEmitter ──▶ subscribers
//! ```
//!
//! [`pipeline::VowelDetector`] ties the pieces together; the other modules
//! are usable on their own (e.g. [`detect::GeometricClassifier`] for
//! offline analysis).

pub mod audio;
pub mod config;
pub mod detect;
pub mod model;
pub mod pipeline;
