//! Value types shared by both classification paths.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vowel
// ---------------------------------------------------------------------------

/// A vowel symbol.
///
/// The spectral detector only knows the vowels that have a formant range
/// configured (O, I and A by default); the learned detector can emit all
/// five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Vowel {
    A,
    E,
    I,
    O,
    U,
}

impl Vowel {
    /// Every vowel, in the learned model's output order.
    pub const ALL: [Vowel; 5] = [Vowel::A, Vowel::E, Vowel::I, Vowel::O, Vowel::U];

    /// Order in which the geometric classifier visits candidates.  Ties in
    /// distance resolve to the earlier entry.
    pub const FORMANT_ORDER: [Vowel; 5] = [Vowel::O, Vowel::I, Vowel::A, Vowel::E, Vowel::U];

    pub fn as_str(self) -> &'static str {
        match self {
            Vowel::A => "A",
            Vowel::E => "E",
            Vowel::I => "I",
            Vowel::O => "O",
            Vowel::U => "U",
        }
    }
}

impl fmt::Display for Vowel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The chant the game asks the player to repeat: "oiiaioiiiai".
pub const TARGET_SEQUENCE: [Vowel; 11] = [
    Vowel::O,
    Vowel::I,
    Vowel::I,
    Vowel::A,
    Vowel::I,
    Vowel::O,
    Vowel::I,
    Vowel::I,
    Vowel::I,
    Vowel::A,
    Vowel::I,
];

// ---------------------------------------------------------------------------
// DetectionStatus
// ---------------------------------------------------------------------------

/// Outcome category of a single analysed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    /// A vowel was recognised with enough confidence to act on.
    Detected,
    /// A vowel was recognised, but only weakly.
    Ambiguous,
    /// Audible input that matched no vowel.
    Noise,
    /// Input below the silence threshold.
    Silence,
}

// ---------------------------------------------------------------------------
// Formants
// ---------------------------------------------------------------------------

/// First and second formant frequencies in Hz.  Both are zero when the frame
/// was not analysed spectrally.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Formants {
    pub f1: f32,
    pub f2: f32,
}

// ---------------------------------------------------------------------------
// DetectionResult
// ---------------------------------------------------------------------------

/// The classification of one frame.  Created once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Recognised vowel, `None` for silence/noise.
    pub vowel: Option<Vowel>,
    pub status: DetectionStatus,
    /// In `[0.0, 1.0]`.
    pub confidence: f32,
    pub formants: Formants,
    /// Frame level in dB, clamped to `[-100.0, 0.0]`.
    pub volume: f32,
    /// Monotonic time at which the frame was analysed.
    pub timestamp: Instant,
}

impl DetectionResult {
    /// A silence frame at `volume` dB.
    pub fn silence(volume: f32, timestamp: Instant) -> Self {
        Self {
            vowel: None,
            status: DetectionStatus::Silence,
            confidence: 0.0,
            formants: Formants::default(),
            volume,
            timestamp,
        }
    }

    /// `true` when this frame should be acted upon as a vowel onset
    /// candidate.
    pub fn is_detected(&self) -> bool {
        self.status == DetectionStatus::Detected && self.vowel.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
