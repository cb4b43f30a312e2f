//! Formant-geometry vowel classifier for the spectral path.
//!
//! Each configured vowel is a rectangle in the (F1, F2) plane.  A frame is
//! scored against every rectangle by its distance to the centre, with each
//! axis scaled by that rectangle's width, so a wide F2 band does not swamp a
//! narrow F1 band.
//!
//! | Best candidate          | Confidence              |
//! |-------------------------|-------------------------|
//! | inside its rectangle    | `max(0.7, 1 − 0.3·d)`   |
//! | outside, `d < 1.5`      | `max(0.3, 0.7 − 0.3·d)` |
//! | outside, `d ≥ 1.5`      | no vowel, 0             |

use std::cmp::Ordering;
use std::time::Instant;

use crate::audio::level::frame_volume_db;
use crate::audio::spectrum::SpectralFrame;
use crate::config::{FormantRange, FormantTable};
use crate::detect::formant::extract_formants;
use crate::detect::types::{DetectionResult, DetectionStatus, Vowel};

const IN_RANGE_FLOOR: f32 = 0.7;
const OUT_OF_RANGE_FLOOR: f32 = 0.3;
const MAX_DISTANCE: f32 = 1.5;
const DISTANCE_PENALTY: f32 = 0.3;
/// Confidence a spectral classification must exceed to count as detected.
pub const DETECTED_ABOVE: f32 = 0.4;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    vowel: Vowel,
    distance: f32,
    in_range: bool,
}

/// Classifies (F1, F2) pairs against a fixed formant table.
#[derive(Debug, Clone)]
pub struct GeometricClassifier {
    ranges: Vec<(Vowel, FormantRange)>,
}

impl GeometricClassifier {
    /// Ranges are visited in O, I, A, E, U order; earlier vowels win ties.
    pub fn new(table: &FormantTable) -> Self {
        Self {
            ranges: table.iter().collect(),
        }
    }

    /// Vowels this classifier can produce.
    pub fn alphabet(&self) -> impl Iterator<Item = Vowel> + '_ {
        self.ranges.iter().map(|(v, _)| *v)
    }

    fn score(vowel: Vowel, range: &FormantRange, f1: f32, f2: f32) -> Candidate {
        let (c1, c2) = range.center();
        let (w1, w2) = range.width();
        let d1 = (f1 - c1) / w1;
        let d2 = (f2 - c2) / w2;
        Candidate {
            vowel,
            distance: (d1 * d1 + d2 * d2).sqrt(),
            in_range: range.contains(f1, f2),
        }
    }

    /// Best vowel for `(f1, f2)` and its confidence in `[0, 1]`.
    ///
    /// ```rust
    /// use vowel_detect::config::FormantTable;
    /// use vowel_detect::detect::{GeometricClassifier, Vowel};
    ///
    /// let classifier = GeometricClassifier::new(&FormantTable::default());
    /// let (vowel, confidence) = classifier.classify(500.0, 1_000.0);
    /// assert_eq!(vowel, Some(Vowel::O));
    /// assert_eq!(confidence, 1.0);
    /// ```
    pub fn classify(&self, f1: f32, f2: f32) -> (Option<Vowel>, f32) {
        // min_by keeps the first of equal elements, matching a stable sort.
        let best = self
            .ranges
            .iter()
            .map(|(v, r)| Self::score(*v, r, f1, f2))
            .min_by(|a, b| match (a.in_range, b.in_range) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => a.distance.total_cmp(&b.distance),
            });

        let Some(best) = best else {
            return (None, 0.0);
        };

        let confidence = if best.in_range {
            IN_RANGE_FLOOR.max(1.0 - best.distance * DISTANCE_PENALTY)
        } else if best.distance < MAX_DISTANCE {
            OUT_OF_RANGE_FLOOR.max(IN_RANGE_FLOOR - best.distance * DISTANCE_PENALTY)
        } else {
            return (None, 0.0);
        };

        (Some(best.vowel), confidence.min(1.0))
    }

    /// Status for a non-silent classification.
    pub fn status_for(vowel: Option<Vowel>, confidence: f32) -> DetectionStatus {
        match vowel {
            Some(_) if confidence > DETECTED_ABOVE => DetectionStatus::Detected,
            Some(_) => DetectionStatus::Ambiguous,
            None => DetectionStatus::Noise,
        }
    }

    /// Classify one spectral frame.
    ///
    /// Frames quieter than `silence_threshold_db` are returned as silence
    /// without looking at the formants.
    pub fn analyse_frame(
        &self,
        frame: &SpectralFrame,
        sample_rate: u32,
        fft_size: usize,
        silence_threshold_db: f32,
        now: Instant,
    ) -> DetectionResult {
        let volume = frame_volume_db(&frame.time_domain, &frame.frequency_db, sample_rate, fft_size);
        if volume < silence_threshold_db {
            return DetectionResult::silence(volume, now);
        }

        let formants = extract_formants(&frame.frequency_db, sample_rate, fft_size);
        let (vowel, confidence) = self.classify(formants.f1, formants.f2);
        DetectionResult {
            vowel,
            status: Self::status_for(vowel, confidence),
            confidence,
            formants,
            volume,
            timestamp: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
