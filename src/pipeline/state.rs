//! Observable detector state and diagnostics.
//!
//! [`DetectorStatus`] is everything a UI or game loop reads about the
//! detector: the latest frame, the confirmed vowel, lifecycle flags and the
//! last fatal error.  The detector publishes it on a
//! `tokio::sync::watch` channel after every analysed frame and lifecycle
//! change; receivers always see the most recent value.
//!
//! [`AudioDiagnostics`] is a serialisable snapshot for support logs.

use serde::Serialize;

use crate::config::DetectorMode;
use crate::detect::{DetectionResult, Vowel};

// ---------------------------------------------------------------------------
// DebugFrame
// ---------------------------------------------------------------------------

/// Raw data behind the latest frame, for visualisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugFrame {
    /// dB spectrum (spectral path only).
    pub frequency_db: Option<Vec<f32>>,
    /// Time-domain samples the frame was computed from.
    pub time_domain: Option<Vec<f32>>,
}

// ---------------------------------------------------------------------------
// DetectorStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DetectorStatus {
    /// Classification of the most recent frame.
    pub current_result: Option<DetectionResult>,
    /// Vowel last emitted since the most recent silence gap.
    pub confirmed_vowel: Option<Vowel>,
    pub is_listening: bool,
    /// Audio (and, in learned mode, the model) acquired.
    pub is_initialized: bool,
    /// Message of the last fatal error; cleared by `reset()`.
    pub last_error: Option<String>,
    /// Model output for the last inferred window (learned mode).
    pub latest_probabilities: Option<Vec<f32>>,
    pub debug_frame: DebugFrame,
}

impl DetectorStatus {
    /// Short lifecycle label.
    pub fn label(&self) -> &'static str {
        match (self.is_initialized, self.is_listening, self.last_error.is_some()) {
            (_, _, true) => "Error",
            (_, true, _) => "Listening",
            (true, false, _) => "Paused",
            (false, false, _) => "Idle",
        }
    }
}

// ---------------------------------------------------------------------------
// AudioDiagnostics
// ---------------------------------------------------------------------------

/// Configuration and stream facts useful when debugging rate mismatches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioDiagnostics {
    pub mode: DetectorMode,
    pub target_sample_rate: u32,
    /// Device rate; `None` until the source is initialised.
    pub actual_sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub window_samples: usize,
    pub expected_window_ms: f64,
    pub fft_size: usize,
    pub frame_interval_ms: u64,
    pub publish_interval_ms: u64,
    pub silence_threshold_db: f32,
    pub silence_timeout_ms: u64,
    /// Learned mode only.
    pub model_path: Option<String>,
    /// `"running"`, `"suspended"` or `"closed"`.
    pub stream_state: &'static str,
    pub is_initialized: bool,
    pub is_listening: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
