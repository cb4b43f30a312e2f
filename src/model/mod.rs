//! Learned vowel model backends.
//!
//! # Architecture
//!
//! ```text
//! VowelDetector::start()
//!        │
//!        ▼
//! ModelLoader::load(path) ──▶ Box<dyn VowelModel>
//!                                    │
//!                  per frame:        ▼
//!        16 kHz window ──▶ LogMelFrontEnd ──▶ VowelCnn ──▶ [pA, pE, pI, pO, pU, pSilence]
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vowel_detect::model::{ModelLoader, SafetensorsLoader};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut model = SafetensorsLoader
//!         .load(Path::new("models/vowel/model.safetensors"))
//!         .await
//!         .expect("model missing");
//!     let window = vec![0.0f32; 3_360]; // 210 ms @ 16 kHz
//!     let probabilities = model.predict(&window).unwrap();
//!     println!("{probabilities:?}");
//! }
//! ```

pub mod cnn;
pub mod engine;
pub mod features;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use cnn::{CandleVowelModel, SafetensorsLoader, VowelCnn, NUM_CLASSES};
pub use engine::{ModelError, ModelLoader, NoModelLoader, VowelModel};
pub use features::LogMelFrontEnd;

// test-only re-export so the detector tests can build scripted models.
#[cfg(test)]
pub use engine::{MockLoader, MockModel};
