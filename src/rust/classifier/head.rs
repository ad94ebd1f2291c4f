//! Two-class classification head placed on top of the sentence encoder.
//!
//! ```text
//! Embedding (E) → Linear(2) → Softmax
//! ```

use std::path::Path;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Init, Linear, Module, VarBuilder, VarMap};

use crate::error::{Result, SentimentError};
use crate::sentiment::{Prediction, NUM_LABELS};

/// Prefix of the head's parameters inside a safetensors file
const PARAM_PREFIX: &str = "classifier";

#[derive(Debug, Clone)]
pub struct SentimentHead {
    linear: Linear,
    embedding_size: usize,
    device: Device,
}

impl SentimentHead {
    /// Creates a trainable head whose parameters live in `varmap`.
    ///
    /// Weights and bias start at zero, which makes training reproducible
    /// for a given shuffle seed.
    pub fn new_trainable(varmap: &VarMap, embedding_size: usize, device: &Device) -> Result<Self> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device).pp(PARAM_PREFIX);
        let weight = vb.get_with_hints((NUM_LABELS, embedding_size), "weight", Init::Const(0.0))?;
        let bias = vb.get_with_hints(NUM_LABELS, "bias", Init::Const(0.0))?;
        Ok(Self {
            linear: Linear::new(weight, Some(bias)),
            embedding_size,
            device: device.clone(),
        })
    }

    /// Builds a head from explicit parameters: `weight` is row-major
    /// `[2, embedding_size]`, `bias` has one entry per class.
    pub fn from_parameters(weight: Vec<f32>, bias: Vec<f32>, embedding_size: usize, device: &Device) -> Result<Self> {
        let weight = Tensor::from_vec(weight, (NUM_LABELS, embedding_size), device)?;
        let bias = Tensor::from_vec(bias, NUM_LABELS, device)?;
        Ok(Self {
            linear: Linear::new(weight, Some(bias)),
            embedding_size,
            device: device.clone(),
        })
    }

    /// Loads head parameters written by [`VarMap::save`].
    pub fn load(path: &Path, embedding_size: usize, device: &Device) -> Result<Self> {
        if !path.exists() {
            return Err(SentimentError::CheckpointError(format!("Head weights not found: {:?}", path)));
        }
        let tensors = candle_core::safetensors::load(path, device)?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, device).pp(PARAM_PREFIX);
        let weight = vb.get((NUM_LABELS, embedding_size), "weight").map_err(|e| {
            SentimentError::CheckpointError(format!("Incompatible head weights in {:?}: {}", path, e))
        })?;
        let bias = vb.get(NUM_LABELS, "bias").map_err(|e| {
            SentimentError::CheckpointError(format!("Incompatible head bias in {:?}: {}", path, e))
        })?;
        Ok(Self {
            linear: Linear::new(weight, Some(bias)),
            embedding_size,
            device: device.clone(),
        })
    }

    pub fn embedding_size(&self) -> usize {
        self.embedding_size
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// `[batch, embedding_size]` → `[batch, 2]` logits.
    pub fn forward_logits(&self, inputs: &Tensor) -> Result<Tensor> {
        Ok(self.linear.forward(inputs)?)
    }

    /// Class probabilities for a single embedding, indexed by class.
    pub fn probabilities(&self, embedding: &[f32]) -> Result<[f32; NUM_LABELS]> {
        if embedding.len() != self.embedding_size {
            return Err(SentimentError::ModelError(format!(
                "Embedding has {} dimensions, head expects {}",
                embedding.len(),
                self.embedding_size
            )));
        }

        let input = Tensor::from_slice(embedding, (1, self.embedding_size), &self.device)?;
        let logits = self.forward_logits(&input)?;
        let probs: Vec<f32> = candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1()?;

        match probs.as_slice() {
            &[negative, positive] => Ok([negative, positive]),
            other => Err(SentimentError::ModelError(format!(
                "Head produced {} probabilities, expected {}",
                other.len(),
                NUM_LABELS
            ))),
        }
    }

    pub fn predict(&self, embedding: &[f32]) -> Result<Prediction> {
        Ok(Prediction::from_probabilities(self.probabilities(embedding)?))
    }
}
