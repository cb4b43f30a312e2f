//! Detector settings, defaults and TOML persistence.
//!
//! Every struct carries `#[serde(default)]`, so a partial `settings.toml`
//! only overrides the keys it names.  Formant ranges merge per vowel: a file
//! that only declares `[detector.formants.O]` keeps the default I and A
//! ranges.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::detect::Vowel;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A setting that cannot produce a working detector.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("formant range for {vowel} is degenerate on {axis} ({min} >= {max})")]
    DegenerateRange {
        vowel: Vowel,
        axis: &'static str,
        min: f32,
        max: f32,
    },

    #[error("fft_size must be a power of two >= 32 (got {0})")]
    FftSize(usize),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("smoothing must be in [0.0, 1.0) (got {0})")]
    Smoothing(f32),

    #[error("hysteresis thresholds must satisfy 0 <= low < high <= 1 (low {low}, high {high})")]
    Hysteresis { low: f32, high: f32 },

    #[error("spectral mode needs at least one formant range")]
    NoFormants,
}

// ---------------------------------------------------------------------------
// DetectorMode
// ---------------------------------------------------------------------------

/// Which classification strategy drives the detector.
///
/// | Variant  | Frames                        | Classifier            |
/// |----------|-------------------------------|-----------------------|
/// | Spectral | FFT of the native-rate window | formant geometry      |
/// | Learned  | 16 kHz resampled snapshots    | pretrained model      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    #[default]
    Spectral,
    Learned,
}

impl DetectorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorMode::Spectral => "spectral",
            DetectorMode::Learned => "learned",
        }
    }
}

// ---------------------------------------------------------------------------
// FormantRange / FormantTable
// ---------------------------------------------------------------------------

/// Expected F1/F2 band for one vowel, in Hz (`[min, max]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormantRange {
    pub f1: [f32; 2],
    pub f2: [f32; 2],
}

impl FormantRange {
    pub const fn new(f1: [f32; 2], f2: [f32; 2]) -> Self {
        Self { f1, f2 }
    }

    /// Centre of the range as `(f1, f2)`.
    pub fn center(&self) -> (f32, f32) {
        ((self.f1[0] + self.f1[1]) / 2.0, (self.f2[0] + self.f2[1]) / 2.0)
    }

    /// Width of the range as `(f1, f2)`.
    pub fn width(&self) -> (f32, f32) {
        (self.f1[1] - self.f1[0], self.f2[1] - self.f2[0])
    }

    /// Inclusive containment on both axes.
    pub fn contains(&self, f1: f32, f2: f32) -> bool {
        f1 >= self.f1[0] && f1 <= self.f1[1] && f2 >= self.f2[0] && f2 <= self.f2[1]
    }

    fn validate(&self, vowel: Vowel) -> Result<(), ConfigError> {
        for (axis, [min, max]) in [("f1", self.f1), ("f2", self.f2)] {
            if !(max > min) {
                return Err(ConfigError::DegenerateRange {
                    vowel,
                    axis,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Per-vowel formant ranges.
///
/// | Vowel | F1 (Hz)   | F2 (Hz)    |
/// |-------|-----------|------------|
/// | O     | 400–600   | 800–1200   |
/// | I     | 200–400   | 2000–3000  |
/// | A     | 700–1000  | 1200–1800  |
///
/// E and U have no default range and are therefore never produced by the
/// spectral detector unless configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormantTable {
    #[serde(rename = "A", skip_serializing_if = "Option::is_none")]
    pub a: Option<FormantRange>,
    #[serde(rename = "E", skip_serializing_if = "Option::is_none")]
    pub e: Option<FormantRange>,
    #[serde(rename = "I", skip_serializing_if = "Option::is_none")]
    pub i: Option<FormantRange>,
    #[serde(rename = "O", skip_serializing_if = "Option::is_none")]
    pub o: Option<FormantRange>,
    #[serde(rename = "U", skip_serializing_if = "Option::is_none")]
    pub u: Option<FormantRange>,
}

impl Default for FormantTable {
    fn default() -> Self {
        Self {
            a: Some(FormantRange::new([700.0, 1000.0], [1200.0, 1800.0])),
            e: None,
            i: Some(FormantRange::new([200.0, 400.0], [2000.0, 3000.0])),
            o: Some(FormantRange::new([400.0, 600.0], [800.0, 1200.0])),
            u: None,
        }
    }
}

impl FormantTable {
    /// A table with no ranges at all.
    pub fn empty() -> Self {
        Self {
            a: None,
            e: None,
            i: None,
            o: None,
            u: None,
        }
    }

    pub fn get(&self, vowel: Vowel) -> Option<&FormantRange> {
        match vowel {
            Vowel::A => self.a.as_ref(),
            Vowel::E => self.e.as_ref(),
            Vowel::I => self.i.as_ref(),
            Vowel::O => self.o.as_ref(),
            Vowel::U => self.u.as_ref(),
        }
    }

    /// Replace the range of a single vowel, keeping the others.
    pub fn set(&mut self, vowel: Vowel, range: FormantRange) {
        let slot = match vowel {
            Vowel::A => &mut self.a,
            Vowel::E => &mut self.e,
            Vowel::I => &mut self.i,
            Vowel::O => &mut self.o,
            Vowel::U => &mut self.u,
        };
        *slot = Some(range);
    }

    /// Configured ranges in classifier visiting order (O, I, A, E, U).
    pub fn iter(&self) -> impl Iterator<Item = (Vowel, FormantRange)> + '_ {
        Vowel::FORMANT_ORDER
            .into_iter()
            .filter_map(|v| self.get(v).map(|r| (v, *r)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

// ---------------------------------------------------------------------------
// HysteresisConfig
// ---------------------------------------------------------------------------

/// Schmitt-trigger thresholds for the learned classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    /// Probability a class must reach to become stable.
    pub high: f32,
    /// Probability below which the stable class is dropped.
    pub low: f32,
    /// Lead a new class needs over the stable one to take over.
    pub switch_margin: f32,
    /// Interval after which a sustained vowel is re-emitted.
    pub re_emit_interval_ms: u64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            high: 0.6,
            low: 0.45,
            switch_margin: 0.08,
            re_emit_interval_ms: 300,
        }
    }
}

impl HysteresisConfig {
    pub fn re_emit_interval(&self) -> Duration {
        Duration::from_millis(self.re_emit_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// DetectorConfig
// ---------------------------------------------------------------------------

/// Everything a [`crate::pipeline::VowelDetector`] needs, resolved once at
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub mode: DetectorMode,
    /// FFT window length of the spectral analyser (samples, power of two).
    pub fft_size: usize,
    /// Preferred capture rate in Hz.  The device may run at a different
    /// rate; the detector always uses the actual one.
    pub sample_rate: u32,
    /// Rate the learned model was trained on.
    pub target_sample_rate: u32,
    /// Length of a learned-path snapshot in target-rate samples.
    pub window_samples: usize,
    /// Minimum time between two analysed frames.
    pub frame_interval_ms: u64,
    /// How often the audio thread publishes a resampled snapshot.
    pub publish_interval_ms: u64,
    /// Frames quieter than this (dB) count as silence.
    pub silence_threshold_db: f32,
    /// Length of continuous silence reported once via the timeout event.
    pub silence_timeout_ms: u64,
    /// Temporal smoothing of the analyser magnitudes, `[0.0, 1.0)`.
    pub smoothing: f32,
    pub formants: FormantTable,
    pub hysteresis: HysteresisConfig,
    /// Weights for the learned mode (`.safetensors`).  Relative paths are
    /// looked up in the models directory; `None` uses
    /// [`AppPaths::default_model_file`].
    pub model_path: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mode: DetectorMode::default(),
            fft_size: 2048,
            sample_rate: 44_100,
            target_sample_rate: 16_000,
            window_samples: 3_360,
            frame_interval_ms: 30,
            publish_interval_ms: 40,
            silence_threshold_db: -35.0,
            silence_timeout_ms: 1_500,
            smoothing: 0.1,
            formants: FormantTable::default(),
            hysteresis: HysteresisConfig::default(),
            model_path: None,
        }
    }
}

impl DetectorConfig {
    pub fn builder() -> DetectorConfigBuilder {
        DetectorConfigBuilder::default()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    /// Model file resolved against the platform models directory.
    pub fn resolved_model_path(&self) -> PathBuf {
        AppPaths::new().model_file(self.model_path.as_deref())
    }

    /// Check every invariant the detector relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(ConfigError::FftSize(self.fft_size));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Zero("sample_rate"));
        }
        if self.target_sample_rate == 0 {
            return Err(ConfigError::Zero("target_sample_rate"));
        }
        if self.window_samples == 0 {
            return Err(ConfigError::Zero("window_samples"));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(ConfigError::Smoothing(self.smoothing));
        }
        let h = &self.hysteresis;
        if !(0.0 <= h.low && h.low < h.high && h.high <= 1.0) {
            return Err(ConfigError::Hysteresis {
                low: h.low,
                high: h.high,
            });
        }
        for (vowel, range) in self.formants.iter() {
            range.validate(vowel)?;
        }
        if self.mode == DetectorMode::Spectral && self.formants.is_empty() {
            return Err(ConfigError::NoFormants);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DetectorConfigBuilder
// ---------------------------------------------------------------------------

/// Named optional overrides applied over [`DetectorConfig::default`].
///
/// ```rust
/// use vowel_detect::config::{DetectorConfig, DetectorMode, FormantRange};
/// use vowel_detect::detect::Vowel;
///
/// let cfg = DetectorConfig::builder()
///     .mode(DetectorMode::Spectral)
///     .silence_threshold_db(-40.0)
///     .formant(Vowel::O, FormantRange::new([380.0, 620.0], [780.0, 1250.0]))
///     .build()
///     .unwrap();
///
/// assert_eq!(cfg.silence_threshold_db, -40.0);
/// // Only O was overridden; I keeps its default range.
/// assert_eq!(cfg.formants.get(Vowel::I).unwrap().f1, [200.0, 400.0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DetectorConfigBuilder {
    mode: Option<DetectorMode>,
    fft_size: Option<usize>,
    sample_rate: Option<u32>,
    target_sample_rate: Option<u32>,
    window_samples: Option<usize>,
    frame_interval_ms: Option<u64>,
    publish_interval_ms: Option<u64>,
    silence_threshold_db: Option<f32>,
    silence_timeout_ms: Option<u64>,
    smoothing: Option<f32>,
    formants: Vec<(Vowel, FormantRange)>,
    hysteresis: Option<HysteresisConfig>,
    model_path: Option<PathBuf>,
}

impl DetectorConfigBuilder {
    pub fn mode(mut self, mode: DetectorMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn fft_size(mut self, size: usize) -> Self {
        self.fft_size = Some(size);
        self
    }

    pub fn sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = Some(hz);
        self
    }

    pub fn target_sample_rate(mut self, hz: u32) -> Self {
        self.target_sample_rate = Some(hz);
        self
    }

    pub fn window_samples(mut self, samples: usize) -> Self {
        self.window_samples = Some(samples);
        self
    }

    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn silence_threshold_db(mut self, db: f32) -> Self {
        self.silence_threshold_db = Some(db);
        self
    }

    pub fn silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = Some(smoothing);
        self
    }

    /// Override a single vowel's range; the other vowels keep theirs.
    pub fn formant(mut self, vowel: Vowel, range: FormantRange) -> Self {
        self.formants.push((vowel, range));
        self
    }

    pub fn hysteresis(mut self, hysteresis: HysteresisConfig) -> Self {
        self.hysteresis = Some(hysteresis);
        self
    }

    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Merge the overrides over `base` and validate the result.
    pub fn build_over(self, base: DetectorConfig) -> Result<DetectorConfig, ConfigError> {
        let mut cfg = base;
        if let Some(v) = self.mode {
            cfg.mode = v;
        }
        if let Some(v) = self.fft_size {
            cfg.fft_size = v;
        }
        if let Some(v) = self.sample_rate {
            cfg.sample_rate = v;
        }
        if let Some(v) = self.target_sample_rate {
            cfg.target_sample_rate = v;
        }
        if let Some(v) = self.window_samples {
            cfg.window_samples = v;
        }
        if let Some(v) = self.frame_interval_ms {
            cfg.frame_interval_ms = v;
        }
        if let Some(v) = self.publish_interval_ms {
            cfg.publish_interval_ms = v;
        }
        if let Some(v) = self.silence_threshold_db {
            cfg.silence_threshold_db = v;
        }
        if let Some(v) = self.silence_timeout_ms {
            cfg.silence_timeout_ms = v;
        }
        if let Some(v) = self.smoothing {
            cfg.smoothing = v;
        }
        for (vowel, range) in self.formants {
            cfg.formants.set(vowel, range);
        }
        if let Some(v) = self.hysteresis {
            cfg.hysteresis = v;
        }
        if self.model_path.is_some() {
            cfg.model_path = self.model_path;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn build(self) -> Result<DetectorConfig, ConfigError> {
        self.build_over(DetectorConfig::default())
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use vowel_detect::config::AppConfig;
///
/// // Returns Default when the file is missing.
/// let config = AppConfig::load().unwrap();
/// println!("mode = {:?}", config.detector.mode);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    /// Print the diagnostics snapshot when the binary exits.
    pub diagnostics_on_exit: bool,
}

impl AppConfig {
    /// Load from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.detector.validate()?;
        Ok(config)
    }

    /// Save to the platform-appropriate `settings.toml`, creating parent
    /// directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
