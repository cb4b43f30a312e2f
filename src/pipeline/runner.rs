//! Detector orchestrator — drives audio → frames → classifier → events.
//!
//! [`VowelDetector`] owns the [`AudioSource`], the frame producer for the
//! configured mode, the classifier, the [`StabilityFilter`] and the
//! subscriber lists.  It is polled: every [`tick`](VowelDetector::tick)
//! analyses at most one frame, and [`run`](VowelDetector::run) drives ticks
//! from a tokio interval until a shutdown future resolves.
//!
//! # Detector flow
//!
//! ```text
//! start()
//!   └─▶ AudioSource::initialize ─▶ [Learned] ModelLoader::load
//!         └─▶ AudioSource::start(sink)                 [listening]
//!
//! tick(now)
//!   ├─ Spectral: SpectralProducer::poll ─▶ GeometricClassifier
//!   └─ Learned:  mailbox.take()        ─▶ LearnedClassifier
//!         ├─ silence ─▶ StabilityFilter::accept_silence ─▶ on_silence / on_silence_timeout
//!         ├─ detected ─▶ StabilityFilter::accept_vowel  ─▶ on_vowel_detected
//!         └─ other    ─▶ StabilityFilter::accept_sound
//!
//! stop()   suspend stream, clear per-utterance state
//! reset()  stop + dispose source + drop model
//!
//! stream failure (AudioSource::take_error)
//!   └─▶ on_error(Device) + release source, listening ends
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::audio::{
    window_mailbox, AudioSource, CaptureError, MailboxReceiver, ResamplingProducer,
    SpectralFrame, SpectralProducer, StreamInfo, WindowTap,
};
use crate::config::{ConfigError, DetectorConfig, DetectorMode};
use crate::detect::{
    DetectionResult, DetectionStatus, EventEmitter, GeometricClassifier, LearnedClassifier,
    LearnedFrame, SilenceUpdate, StabilityFilter, Vowel,
};
use crate::model::{ModelError, ModelLoader};

use super::state::{AudioDiagnostics, DebugFrame, DetectorStatus};

/// Polling period of [`VowelDetector::run`]: one display frame.
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

// ---------------------------------------------------------------------------
// DetectorError
// ---------------------------------------------------------------------------

/// Errors surfaced through `on_error` and [`DetectorStatus::last_error`].
///
/// `Permission`, `Device` and `ModelLoad` end the current acquisition;
/// `Inference` only drops the frame it happened on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectorError {
    #[error("Microphone permission denied: {0}")]
    Permission(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl DetectorError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DetectorError::Inference(_))
    }
}

impl From<CaptureError> for DetectorError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied(msg) => DetectorError::Permission(msg),
            other => DetectorError::Device(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Mode-specific half of the detector, built by `start()`.
enum Analyzer {
    Spectral {
        producer: SpectralProducer,
        classifier: GeometricClassifier,
    },
    Learned {
        rx: MailboxReceiver<Vec<f32>>,
        classifier: LearnedClassifier,
    },
}

enum Analysed {
    Spectral(DetectionResult, SpectralFrame),
    Learned(LearnedFrame, Vec<f32>),
    Failed(ModelError),
}

// ---------------------------------------------------------------------------
// VowelDetector
// ---------------------------------------------------------------------------

/// Real-time vowel detector.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use vowel_detect::audio::CpalSource;
/// use vowel_detect::config::DetectorConfig;
/// use vowel_detect::model::NoModelLoader;
/// use vowel_detect::pipeline::VowelDetector;
///
/// # async fn example() {
/// let config = DetectorConfig::default(); // spectral mode
/// let mut detector = VowelDetector::new(
///     config.clone(),
///     Box::new(CpalSource::new(Some(config.sample_rate))),
///     Arc::new(NoModelLoader),
/// )
/// .unwrap();
///
/// detector.on_vowel_detected(|vowel, result| {
///     println!("{vowel} ({:.0}%)", result.confidence * 100.0);
/// });
/// detector.start().await.unwrap();
/// detector.run(tokio::signal::ctrl_c()).await;
/// # }
/// ```
pub struct VowelDetector {
    config: DetectorConfig,
    source: Box<dyn AudioSource>,
    loader: Arc<dyn ModelLoader>,
    analyzer: Option<Analyzer>,
    stream: Option<StreamInfo>,
    listening: bool,
    suspended: bool,
    stability: StabilityFilter,
    events: EventEmitter,
    status: watch::Sender<DetectorStatus>,
}

impl VowelDetector {
    /// Create a detector.  Nothing is acquired until [`start`](Self::start).
    ///
    /// # Arguments
    ///
    /// * `config` — validated again here; invalid settings are rejected.
    /// * `source` — microphone (e.g. `CpalSource`).
    /// * `loader` — model factory, only used in learned mode.
    pub fn new(
        config: DetectorConfig,
        source: Box<dyn AudioSource>,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let re_emit = match config.mode {
            DetectorMode::Spectral => None,
            DetectorMode::Learned => Some(config.hysteresis.re_emit_interval()),
        };
        let stability = StabilityFilter::new(re_emit, config.silence_timeout());
        let (status, _) = watch::channel(DetectorStatus::default());

        Ok(Self {
            config,
            source,
            loader,
            analyzer: None,
            stream: None,
            listening: false,
            suspended: false,
            stability,
            events: EventEmitter::new(),
            status,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn on_vowel_detected(&mut self, cb: impl FnMut(Vowel, &DetectionResult) + Send + 'static) {
        self.events.on_vowel_detected(cb);
    }

    /// Called on every silent frame after the first of a stretch, with the
    /// time since the stretch began.
    pub fn on_silence(&mut self, cb: impl FnMut(Duration) + Send + 'static) {
        self.events.on_silence(cb);
    }

    /// Called once per silent stretch when it reaches the configured timeout.
    pub fn on_silence_timeout(&mut self, cb: impl FnMut(Duration) + Send + 'static) {
        self.events.on_silence_timeout(cb);
    }

    pub fn on_error(&mut self, cb: impl FnMut(&DetectorError) + Send + 'static) {
        self.events.on_error(cb);
    }

    /// Receiver that always holds the latest [`DetectorStatus`].
    pub fn subscribe(&self) -> watch::Receiver<DetectorStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> DetectorStatus {
        self.status.borrow().clone()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Acquire audio (and the model) if needed and begin listening.
    ///
    /// A no-op while already listening.  Fatal errors are also reported via
    /// `on_error` and stored in the status.
    pub async fn start(&mut self) -> Result<(), DetectorError> {
        if self.listening {
            return Ok(());
        }

        if self.analyzer.is_none() {
            if let Err(err) = self.initialize().await {
                self.source.dispose();
                self.stream = None;
                self.fail(&err);
                return Err(err);
            }
        } else if self.suspended {
            if let Err(e) = self.source.resume() {
                let err = DetectorError::from(e);
                self.fail(&err);
                return Err(err);
            }
            self.suspended = false;
        }

        self.stability.reset();
        match self.analyzer.as_mut() {
            Some(Analyzer::Spectral { producer, .. }) => producer.reset(),
            Some(Analyzer::Learned { rx, classifier }) => {
                rx.clear();
                classifier.reset();
            }
            None => {}
        }

        self.listening = true;
        self.status.send_modify(|s| {
            s.is_listening = true;
            s.is_initialized = true;
            s.last_error = None;
        });
        log::info!("detector: listening ({} mode)", self.config.mode.as_str());
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), DetectorError> {
        let info = self.source.initialize()?;

        let analyzer = match self.config.mode {
            DetectorMode::Spectral => {
                let (tx, rx) = window_mailbox(self.config.fft_size);
                let mut tap = WindowTap::new(self.config.fft_size, tx);
                self.source
                    .start(Box::new(move |quantum: &[f32]| tap.process(quantum)))?;
                Analyzer::Spectral {
                    producer: SpectralProducer::new(
                        rx,
                        self.config.fft_size,
                        self.config.smoothing,
                        self.config.frame_interval(),
                    ),
                    classifier: GeometricClassifier::new(&self.config.formants),
                }
            }
            DetectorMode::Learned => {
                let path = self.config.resolved_model_path();
                let model = self
                    .loader
                    .load(&path)
                    .await
                    .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;
                log::info!("detector: model ready ({})", path.display());

                let (tx, rx) = window_mailbox(self.config.window_samples);
                let mut producer = ResamplingProducer::new(
                    info.sample_rate,
                    self.config.target_sample_rate,
                    self.config.window_samples,
                    self.config.publish_interval(),
                    tx,
                );
                self.source
                    .start(Box::new(move |quantum: &[f32]| producer.process(quantum)))?;
                Analyzer::Learned {
                    rx,
                    classifier: LearnedClassifier::new(model, self.config.hysteresis),
                }
            }
        };

        if info.sample_rate != self.config.sample_rate {
            log::info!(
                "detector: device runs at {} Hz (preferred {} Hz)",
                info.sample_rate,
                self.config.sample_rate
            );
        }

        self.stream = Some(info);
        self.analyzer = Some(analyzer);
        self.suspended = false;
        self.status.send_modify(|s| s.is_initialized = true);
        Ok(())
    }

    /// Stop listening and clear per-utterance state.  The device stays
    /// acquired (suspended) so a later `start()` resumes quickly.
    pub fn stop(&mut self) {
        let was_listening = self.listening;
        self.listening = false;

        if self.analyzer.is_some() && !self.suspended {
            match self.source.suspend() {
                Ok(()) => self.suspended = true,
                Err(e) => log::warn!("detector: could not suspend audio: {e}"),
            }
        }

        self.stability.reset();
        if let Some(Analyzer::Learned { classifier, .. }) = self.analyzer.as_mut() {
            classifier.reset();
        }

        self.status.send_modify(|s| {
            s.is_listening = false;
            s.confirmed_vowel = None;
        });
        if was_listening {
            log::info!("detector: stopped");
        }
    }

    /// Stop, release the audio source and drop the model.  Idempotent.
    pub fn reset(&mut self) {
        self.stop();
        self.release();
        self.status.send_modify(|s| *s = DetectorStatus::default());
    }

    fn release(&mut self) {
        if self.analyzer.take().is_some() {
            log::info!("detector: released audio source");
        }
        self.source.dispose();
        self.stream = None;
        self.suspended = false;
    }

    fn fail(&mut self, err: &DetectorError) {
        log::error!("detector: {err}");
        self.listening = false;
        self.status.send_modify(|s| {
            s.last_error = Some(err.to_string());
            s.is_initialized = false;
            s.is_listening = false;
        });
        self.events.emit_error(err);
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Analyse at most one frame.
    ///
    /// Returns the frame's result, or `None` when not listening, when no
    /// frame was due, or when the frame was dropped by an inference error.
    pub fn tick(&mut self, now: Instant) -> Option<DetectionResult> {
        if !self.listening {
            return None;
        }
        if let Some(e) = self.source.take_error() {
            // The device is gone; a later start() acquires it again.
            self.fail(&DetectorError::from(e));
            self.stability.reset();
            self.release();
            return None;
        }
        let sample_rate = self.stream?.sample_rate;
        let fft_size = self.config.fft_size;
        let threshold = self.config.silence_threshold_db;

        let analysed = match self.analyzer.as_mut()? {
            Analyzer::Spectral {
                producer,
                classifier,
            } => {
                let frame = producer.poll(now)?;
                let result = classifier.analyse_frame(&frame, sample_rate, fft_size, threshold, now);
                Analysed::Spectral(result, frame)
            }
            Analyzer::Learned { rx, classifier } => {
                let window = rx.take()?;
                let analysed = match classifier.analyse_window(&window, threshold, now) {
                    Ok(frame) => Analysed::Learned(frame, window.clone()),
                    Err(e) => Analysed::Failed(e),
                };
                rx.recycle(window);
                analysed
            }
        };

        match analysed {
            Analysed::Spectral(result, frame) => {
                let silent = result.status == DetectionStatus::Silence;
                let debug = DebugFrame {
                    frequency_db: Some(frame.frequency_db),
                    time_domain: Some(frame.time_domain),
                };
                Some(self.apply(result, silent, None, debug, now))
            }
            Analysed::Learned(frame, window) => {
                let probabilities = (!frame.probabilities.is_empty()).then_some(frame.probabilities);
                let debug = DebugFrame {
                    frequency_db: None,
                    time_domain: Some(window),
                };
                Some(self.apply(frame.result, frame.silent, probabilities, debug, now))
            }
            Analysed::Failed(e) => {
                let err = DetectorError::Inference(e.to_string());
                log::warn!("detector: frame dropped: {err}");
                self.events.emit_error(&err);
                None
            }
        }
    }

    fn apply(
        &mut self,
        result: DetectionResult,
        silent: bool,
        probabilities: Option<Vec<f32>>,
        debug: DebugFrame,
        now: Instant,
    ) -> DetectionResult {
        let mut onset = None;
        let mut silence = SilenceUpdate::default();

        if silent {
            silence = self.stability.accept_silence(now);
            if let Some(Analyzer::Learned { classifier, .. }) = self.analyzer.as_mut() {
                classifier.reset();
            }
        } else if let (true, Some(vowel)) = (result.is_detected(), result.vowel) {
            if self.stability.accept_vowel(vowel, now) {
                onset = Some(vowel);
            }
        } else {
            self.stability.accept_sound();
        }

        let confirmed = self.stability.confirmed();
        let snapshot = result.clone();
        self.status.send_modify(move |s| {
            s.current_result = Some(snapshot);
            s.confirmed_vowel = confirmed;
            if let Some(p) = probabilities {
                s.latest_probabilities = Some(p);
            }
            s.debug_frame = debug;
        });

        if let Some(elapsed) = silence.elapsed {
            self.events.emit_silence(elapsed);
        }
        if let Some(elapsed) = silence.timed_out {
            self.events.emit_silence_timeout(elapsed);
        }
        if let Some(vowel) = onset {
            self.events.emit_vowel(vowel, &result);
        }
        result
    }

    /// Tick every [`TICK_INTERVAL`] until `shutdown` resolves, then
    /// [`stop`](Self::stop).
    pub async fn run<F: Future>(&mut self, shutdown: F) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
            }
        }

        log::info!("detector: shutdown requested");
        self.stop();
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    pub fn diagnostics(&self) -> AudioDiagnostics {
        let cfg = &self.config;
        AudioDiagnostics {
            mode: cfg.mode,
            target_sample_rate: cfg.target_sample_rate,
            actual_sample_rate: self.stream.map(|s| s.sample_rate),
            channels: self.stream.map(|s| s.channels),
            window_samples: cfg.window_samples,
            expected_window_ms: cfg.window_samples as f64 / cfg.target_sample_rate as f64 * 1_000.0,
            fft_size: cfg.fft_size,
            frame_interval_ms: cfg.frame_interval_ms,
            publish_interval_ms: cfg.publish_interval_ms,
            silence_threshold_db: cfg.silence_threshold_db,
            silence_timeout_ms: cfg.silence_timeout_ms,
            model_path: (cfg.mode == DetectorMode::Learned)
                .then(|| cfg.resolved_model_path().display().to_string()),
            stream_state: match (self.analyzer.is_some(), self.suspended) {
                (false, _) => "closed",
                (true, true) => "suspended",
                (true, false) => "running",
            },
            is_initialized: self.analyzer.is_some(),
            is_listening: self.listening,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
