//! Vowel model trait, loader trait and implementations.
//!
//! # Overview
//!
//! [`VowelModel`] is what the learned classifier calls once per frame: a
//! 16 kHz window in, one probability per class out (A, E, I, O, U,
//! silence).  It is object-safe and `Send` so the detector can hold a
//! `Box<dyn VowelModel>`.
//!
//! [`ModelLoader`] is the async factory the detector calls once from
//! `start()`.  The production loader is
//! [`SafetensorsLoader`](super::cnn::SafetensorsLoader); [`NoModelLoader`]
//! always fails and is used when no model file is available.
//!
//! [`MockModel`] (available under `#[cfg(test)]`) replays scripted
//! probability vectors.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// All errors that can arise from the model subsystem.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// No model file at the given path.
    #[error("Model not found: {0}")]
    NotFound(String),

    /// The file exists but could not be turned into a model.
    #[error("Model load failed: {0}")]
    Load(String),

    /// A forward pass failed or produced an unusable output.
    #[error("Inference error: {0}")]
    Inference(String),
}

// ---------------------------------------------------------------------------
// VowelModel / ModelLoader
// ---------------------------------------------------------------------------

/// A loaded classifier.
///
/// # Contract
///
/// - `window` is **16 kHz, mono, f32**, exactly the configured window length.
/// - The returned vector has one probability per class in model order.
pub trait VowelModel: Send {
    fn predict(&mut self, window: &[f32]) -> Result<Vec<f32>, ModelError>;
}

// Compile-time assertion: Box<dyn VowelModel> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn VowelModel>) {}
};

/// Asynchronous model factory.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Box<dyn VowelModel>, ModelError>;
}

// ---------------------------------------------------------------------------
// NoModelLoader
// ---------------------------------------------------------------------------

/// Loader used when no backend is available; every load fails with
/// [`ModelError::NotFound`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModelLoader;

#[async_trait]
impl ModelLoader for NoModelLoader {
    async fn load(&self, path: &Path) -> Result<Box<dyn VowelModel>, ModelError> {
        Err(ModelError::NotFound(path.display().to_string()))
    }
}

// ---------------------------------------------------------------------------
// MockModel  (test-only)
// ---------------------------------------------------------------------------

/// Replays a script of outputs, repeating the last one once exhausted.
#[cfg(test)]
pub struct MockModel {
    script: Vec<Result<Vec<f32>, ModelError>>,
    next: usize,
    pub calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MockModel {
    pub fn new(script: Vec<Result<Vec<f32>, ModelError>>) -> Self {
        assert!(!script.is_empty(), "script needs at least one entry");
        Self {
            script,
            next: 0,
            calls: Default::default(),
        }
    }

    /// Always return `probabilities`.
    pub fn constant(probabilities: Vec<f32>) -> Self {
        Self::new(vec![Ok(probabilities)])
    }
}

#[cfg(test)]
impl VowelModel for MockModel {
    fn predict(&mut self, _window: &[f32]) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let idx = self.next.min(self.script.len() - 1);
        self.next += 1;
        self.script[idx].clone()
    }
}

/// Loader handing out a prepared model once.
#[cfg(test)]
pub struct MockLoader {
    model: std::sync::Mutex<Option<Box<dyn VowelModel>>>,
}

#[cfg(test)]
impl MockLoader {
    pub fn new(model: impl VowelModel + 'static) -> Self {
        Self {
            model: std::sync::Mutex::new(Some(Box::new(model))),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(&self, path: &Path) -> Result<Box<dyn VowelModel>, ModelError> {
        self.model
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ModelError::Load(format!("{} already loaded", path.display())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
