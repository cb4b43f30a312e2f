//! Frame classification and event shaping.
//!
//! ```text
//! SpectralFrame ─▶ formant::extract_formants ─▶ GeometricClassifier ─┐
//!                                                                     ├─▶ DetectionResult ─▶ StabilityFilter ─▶ EventEmitter
//! 16 kHz window ─▶ VowelModel ─▶ SchmittTrigger (LearnedClassifier) ──┘
//! ```

pub mod events;
pub mod formant;
pub mod geometric;
pub mod learned;
pub mod stability;
pub mod types;

pub use events::EventEmitter;
pub use formant::{bin_to_frequency, extract_formants, frequency_to_bin};
pub use geometric::GeometricClassifier;
pub use learned::{LearnedClass, LearnedClassifier, LearnedFrame, SchmittTrigger};
pub use stability::{SilenceUpdate, StabilityFilter};
pub use types::{DetectionResult, DetectionStatus, Formants, Vowel, TARGET_SEQUENCE};
