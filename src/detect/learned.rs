//! Learned-model classifier with Schmitt-trigger hysteresis.
//!
//! The model's arg-max flickers when two classes are close.  A class only
//! becomes *stable* once its probability reaches `high`, and stays stable
//! until it drops below `low` or a rival beats it by `switch_margin` while
//! itself above `high`.
//!
//! ```text
//!  p ▲
//!  1 ┤
//!    │      ┌──── adopt (p ≥ high) ───┐
//! hi ┤──────┘                         │
//! lo ┤                                └──── drop (p < low)
//!  0 ┼─────────────────────────────────────────────▶ t
//! ```

use std::fmt;
use std::time::Instant;

use crate::audio::level::{clamp_db, rms_db};
use crate::config::HysteresisConfig;
use crate::detect::types::{DetectionResult, DetectionStatus, Formants, Vowel};
use crate::model::{ModelError, VowelModel};

/// Confidence a held class must exceed to count as detected.
pub const DETECTED_ABOVE: f32 = 0.5;

// ---------------------------------------------------------------------------
// LearnedClass
// ---------------------------------------------------------------------------

/// One output class of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LearnedClass {
    Vowel(Vowel),
    Silence,
}

impl LearnedClass {
    /// Model output order.
    pub const CLASSES: [LearnedClass; 6] = [
        LearnedClass::Vowel(Vowel::A),
        LearnedClass::Vowel(Vowel::E),
        LearnedClass::Vowel(Vowel::I),
        LearnedClass::Vowel(Vowel::O),
        LearnedClass::Vowel(Vowel::U),
        LearnedClass::Silence,
    ];

    /// Position in [`CLASSES`](Self::CLASSES).
    pub fn index(self) -> usize {
        match self {
            LearnedClass::Vowel(Vowel::A) => 0,
            LearnedClass::Vowel(Vowel::E) => 1,
            LearnedClass::Vowel(Vowel::I) => 2,
            LearnedClass::Vowel(Vowel::O) => 3,
            LearnedClass::Vowel(Vowel::U) => 4,
            LearnedClass::Silence => 5,
        }
    }

    pub fn vowel(self) -> Option<Vowel> {
        match self {
            LearnedClass::Vowel(v) => Some(v),
            LearnedClass::Silence => None,
        }
    }
}

impl fmt::Display for LearnedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnedClass::Vowel(v) => v.fmt(f),
            LearnedClass::Silence => f.write_str("silence"),
        }
    }
}

// ---------------------------------------------------------------------------
// SchmittTrigger
// ---------------------------------------------------------------------------

/// Two-threshold latch over the model's classes.
#[derive(Debug, Clone)]
pub struct SchmittTrigger {
    cfg: HysteresisConfig,
    stable: Option<(LearnedClass, f32)>,
}

impl SchmittTrigger {
    pub fn new(cfg: HysteresisConfig) -> Self {
        Self { cfg, stable: None }
    }

    /// The held class and its latest probability.
    pub fn stable(&self) -> Option<(LearnedClass, f32)> {
        self.stable
    }

    pub fn reset(&mut self) {
        self.stable = None;
    }

    /// Feed one frame: the arg-max `candidate` with probability `p` and the
    /// full probability vector it came from.
    pub fn update(&mut self, candidate: LearnedClass, p: f32, probabilities: &[f32]) {
        let HysteresisConfig {
            high,
            low,
            switch_margin,
            ..
        } = self.cfg;

        self.stable = match self.stable {
            None => (p >= high).then_some((candidate, p)),
            Some((held, _)) if held == candidate => (p >= low).then_some((held, p)),
            Some((held, held_p)) => {
                // Re-read the held class from this frame; the stored value may
                // be a stale peak.
                let held_p = probabilities.get(held.index()).copied().unwrap_or(held_p);
                if held_p < low {
                    (p >= high).then_some((candidate, p))
                } else if p >= high && p >= held_p + switch_margin {
                    Some((candidate, p))
                } else {
                    Some((held, held_p))
                }
            }
        };
    }
}

// ---------------------------------------------------------------------------
// LearnedClassifier
// ---------------------------------------------------------------------------

/// Result of classifying one resampled window.
#[derive(Debug, Clone)]
pub struct LearnedFrame {
    pub result: DetectionResult,
    /// Raw model output, one entry per class.  Empty for silent frames that
    /// never reached the model.
    pub probabilities: Vec<f32>,
    /// The model is confident the window is silence.
    pub silent: bool,
}

/// Runs the model and the Schmitt trigger over 16 kHz windows.
pub struct LearnedClassifier {
    model: Box<dyn VowelModel>,
    trigger: SchmittTrigger,
}

impl LearnedClassifier {
    pub fn new(model: Box<dyn VowelModel>, hysteresis: HysteresisConfig) -> Self {
        Self {
            model,
            trigger: SchmittTrigger::new(hysteresis),
        }
    }

    pub fn trigger(&self) -> &SchmittTrigger {
        &self.trigger
    }

    pub fn reset(&mut self) {
        self.trigger.reset();
    }

    /// Classify one window.
    ///
    /// Windows quieter than `silence_threshold_db` skip inference.  A model
    /// output whose length is not one per class is an inference error and
    /// leaves the trigger untouched.
    pub fn analyse_window(
        &mut self,
        window: &[f32],
        silence_threshold_db: f32,
        now: Instant,
    ) -> Result<LearnedFrame, ModelError> {
        let volume = clamp_db(rms_db(window));
        if volume < silence_threshold_db {
            return Ok(LearnedFrame {
                result: DetectionResult::silence(volume, now),
                probabilities: Vec::new(),
                silent: true,
            });
        }

        let probabilities = self.model.predict(window)?;
        if probabilities.len() != LearnedClass::CLASSES.len() {
            return Err(ModelError::Inference(format!(
                "expected {} class probabilities, got {}",
                LearnedClass::CLASSES.len(),
                probabilities.len()
            )));
        }

        // First strict maximum above zero; an all-zero output picks class 0.
        let (mut best, mut best_p) = (0, 0.0_f32);
        for (i, &p) in probabilities.iter().enumerate() {
            if p > best_p {
                best = i;
                best_p = p;
            }
        }
        let candidate = LearnedClass::CLASSES[best];
        let candidate_p = best_p.clamp(0.0, 1.0);

        self.trigger.update(candidate, candidate_p, &probabilities);

        let held = self.trigger.stable();
        let confidence = held.map_or(candidate_p, |(_, p)| p);
        let status = match held {
            Some(_) if confidence > DETECTED_ABOVE => DetectionStatus::Detected,
            Some(_) => DetectionStatus::Ambiguous,
            None => DetectionStatus::Noise,
        };

        let detected_class = held
            .map(|(class, _)| class)
            .filter(|_| status == DetectionStatus::Detected);

        if detected_class == Some(LearnedClass::Silence) {
            let mut result = DetectionResult::silence(volume, now);
            result.confidence = confidence;
            return Ok(LearnedFrame {
                result,
                probabilities,
                silent: true,
            });
        }

        Ok(LearnedFrame {
            result: DetectionResult {
                vowel: detected_class.and_then(LearnedClass::vowel),
                status,
                confidence,
                formants: Formants::default(),
                volume,
                timestamp: now,
            },
            probabilities,
            silent: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
