//! Convolutional vowel classifier on `candle`.
//!
//! ```text
//! [1, 1, time, 40] log-mel
//!   conv1 3×3 ×32 ─ relu ─ bn1 ─ maxpool 2
//!   conv2 3×3 ×64 ─ relu ─ bn2 ─ maxpool 2
//!   conv3 3×3 ×64 ─ relu ─ bn3
//!   mean over time × mel ─▶ dense1 (32, relu) ─▶ vowel_output (6) ─▶ softmax
//! ```
//!
//! Weights are read from a safetensors file.  Tensor names follow the layer
//! names above in candle's layout:
//!
//! | tensor                                   | shape              |
//! |------------------------------------------|--------------------|
//! | `conv{1,2,3}.weight` / `.bias`           | `[out, in, 3, 3]` / `[out]` |
//! | `bn{1,2,3}.weight` / `.bias` / `.running_mean` / `.running_var` | `[channels]` |
//! | `dense1.weight` / `.bias`                | `[32, 64]` / `[32]` |
//! | `vowel_output.weight` / `.bias`          | `[6, 32]` / `[6]`  |
//!
//! Dense kernels are stored `[out, in]`.  Batch norm uses ε = 1e-3.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{
    batch_norm, conv2d, linear, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, Linear, Module,
    ModuleT, VarBuilder,
};

use super::engine::{ModelError, ModelLoader, VowelModel};
use super::features::{frame_count, samples_for_frames, LogMelFrontEnd, N_MELS};

/// Output classes: A, E, I, O, U, silence.
pub const NUM_CLASSES: usize = 6;

/// Fewest frames that survive both pooling stages.
const MIN_FRAMES: usize = 4;

const BN_EPS: f64 = 1e-3;

// ---------------------------------------------------------------------------
// VowelCnn
// ---------------------------------------------------------------------------

pub struct VowelCnn {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
    conv3: Conv2d,
    bn3: BatchNorm,
    dense1: Linear,
    output: Linear,
}

impl VowelCnn {
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let same = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let bn = BatchNormConfig {
            eps: BN_EPS,
            ..Default::default()
        };
        Ok(Self {
            conv1: conv2d(1, 32, 3, same, vb.pp("conv1"))?,
            bn1: batch_norm(32, bn, vb.pp("bn1"))?,
            conv2: conv2d(32, 64, 3, same, vb.pp("conv2"))?,
            bn2: batch_norm(64, bn, vb.pp("bn2"))?,
            conv3: conv2d(64, 64, 3, same, vb.pp("conv3"))?,
            bn3: batch_norm(64, bn, vb.pp("bn3"))?,
            dense1: linear(64, 32, vb.pp("dense1"))?,
            output: linear(32, NUM_CLASSES, vb.pp("vowel_output"))?,
        })
    }

    /// `mel`: `[batch, 1, time, N_MELS]`.  Returns `[batch, NUM_CLASSES]`
    /// probabilities.
    pub fn forward(&self, mel: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.conv1.forward(mel)?.relu()?;
        let x = self.bn1.forward_t(&x, false)?.max_pool2d(2)?;

        let x = self.conv2.forward(&x)?.relu()?;
        let x = self.bn2.forward_t(&x, false)?.max_pool2d(2)?;

        let x = self.conv3.forward(&x)?.relu()?;
        let x = self.bn3.forward_t(&x, false)?;

        let x = x.mean((2, 3))?;
        let x = self.dense1.forward(&x)?.relu()?;
        let logits = self.output.forward(&x)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }
}

// ---------------------------------------------------------------------------
// CandleVowelModel
// ---------------------------------------------------------------------------

/// [`VowelModel`] running the log-mel front end and [`VowelCnn`] on the CPU.
pub struct CandleVowelModel {
    front_end: LogMelFrontEnd,
    network: VowelCnn,
    device: Device,
    features: Vec<f32>,
}

impl CandleVowelModel {
    pub fn new(network: VowelCnn, device: Device) -> Self {
        Self {
            front_end: LogMelFrontEnd::new(),
            network,
            device,
            features: Vec::new(),
        }
    }

    /// Read weights from a safetensors file.  Blocking.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let device = Device::Cpu;
        let load_err = |e: candle_core::Error| ModelError::Load(format!("{}: {e}", path.display()));

        let tensors = candle_core::safetensors::load(path, &device).map_err(load_err)?;
        let count = tensors.len();
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let network = VowelCnn::new(vb).map_err(load_err)?;

        log::info!("model: loaded {} ({count} tensors)", path.display());
        Ok(Self::new(network, device))
    }
}

impl VowelModel for CandleVowelModel {
    fn predict(&mut self, window: &[f32]) -> Result<Vec<f32>, ModelError> {
        if frame_count(window.len()) < MIN_FRAMES {
            return Err(ModelError::Inference(format!(
                "window of {} samples is shorter than {}",
                window.len(),
                samples_for_frames(MIN_FRAMES)
            )));
        }

        let frames = self.front_end.compute(window, &mut self.features);
        let run = || -> candle_core::Result<Vec<f32>> {
            let mel = Tensor::from_slice(&self.features, (1, 1, frames, N_MELS), &self.device)?;
            self.network.forward(&mel)?.squeeze(0)?.to_vec1::<f32>()
        };
        run().map_err(|e| ModelError::Inference(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// SafetensorsLoader
// ---------------------------------------------------------------------------

/// Loads a [`CandleVowelModel`] from a `.safetensors` file on a blocking
/// thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SafetensorsLoader;

#[async_trait]
impl ModelLoader for SafetensorsLoader {
    async fn load(&self, path: &Path) -> Result<Box<dyn VowelModel>, ModelError> {
        match tokio::fs::metadata(path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModelError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(ModelError::Load(format!("{}: {e}", path.display()))),
        }

        let owned: PathBuf = path.to_path_buf();
        let model = tokio::task::spawn_blocking(move || CandleVowelModel::load(&owned))
            .await
            .map_err(|e| ModelError::Load(format!("loader task failed: {e}")))??;
        Ok(Box::new(model))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;
    use std::f32::consts::PI;
    use std::io::Write;

    fn random_model() -> (VarMap, CandleVowelModel) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let network = VowelCnn::new(vb).unwrap();
        (varmap, CandleVowelModel::new(network, Device::Cpu))
    }

    fn voiced(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                0.4 * (2.0 * PI * 300.0 * t).sin() + 0.2 * (2.0 * PI * 2_300.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn predict_returns_one_probability_per_class() {
        let (_varmap, mut model) = random_model();
        let p = model.predict(&voiced(3_360)).unwrap();
        assert_eq!(p.len(), NUM_CLASSES);
        assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn shortest_usable_window_still_classifies() {
        let (_varmap, mut model) = random_model();
        assert_eq!(model.predict(&voiced(880)).unwrap().len(), NUM_CLASSES);
        assert!(matches!(
            model.predict(&voiced(879)),
            Err(ModelError::Inference(_))
        ));
    }

    #[test]
    fn prediction_is_repeatable() {
        let (_varmap, mut model) = random_model();
        let window = voiced(3_360);
        let first = model.predict(&window).unwrap();
        assert_eq!(model.predict(&window).unwrap(), first);
    }

    #[tokio::test]
    async fn loader_reads_saved_weights() {
        let (varmap, mut model) = random_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        varmap.save(&path).unwrap();

        let window = voiced(3_360);
        let expected = model.predict(&window).unwrap();
        let mut loaded = SafetensorsLoader.load(&path).await.unwrap();
        let got = loaded.predict(&window).unwrap();
        for (a, b) in got.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-6, "{got:?} vs {expected:?}");
        }
    }

    #[tokio::test]
    async fn loader_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = SafetensorsLoader.load(&dir.path().join("model.safetensors")).await;
        assert!(matches!(result, Err(ModelError::NotFound(_))));
    }

    #[tokio::test]
    async fn loader_garbage_is_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not safetensors").unwrap();
        let result = SafetensorsLoader.load(file.path()).await;
        assert!(matches!(result, Err(ModelError::Load(_))));
    }

    #[tokio::test]
    async fn loader_rejects_file_missing_layers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.safetensors");
        let only_conv1 = VarMap::new();
        let vb = VarBuilder::from_varmap(&only_conv1, DType::F32, &Device::Cpu);
        conv2d(1, 32, 3, Conv2dConfig::default(), vb.pp("conv1")).unwrap();
        only_conv1.save(&path).unwrap();

        let err = SafetensorsLoader.load(&path).await.err().unwrap();
        assert!(matches!(err, ModelError::Load(_)));
        assert!(err.to_string().contains("partial.safetensors"));
    }
}
