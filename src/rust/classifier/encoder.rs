use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array2, Ix3};
use ort::session::Session;
use ort::value::Tensor;

use super::tokenizer::{TokenizedInput, TokenizedReview, TokenizerAdapter};
use super::utils::{mean_pool, normalize_vector};
use crate::error::{Result, SentimentError};
use crate::model_manager::ModelManager;
use crate::models::{BuiltinModel, ModelCharacteristics};
use crate::runtime::{load_session, RuntimeConfig};
use crate::sentiment::ReviewRecord;

/// Turns text into a fixed-size sentence embedding.
///
/// The classification head only ever sees the output of this trait, which
/// keeps the encoder swappable (an ONNX graph in production, a lexicon in
/// tests).
pub trait SentenceEncoder: Send + Sync {
    /// Identifier recorded in checkpoints so a head is never paired with a
    /// different encoder than the one it was trained on
    fn name(&self) -> &str;

    fn embedding_size(&self) -> usize;

    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Frozen pre-trained encoder executed by ONNX Runtime.
///
/// The graph is expected to:
/// - accept `input_ids` and `attention_mask` (and optionally `token_type_ids`),
///   each of shape `[1, sequence_length]`
/// - output token embeddings of shape `[1, sequence_length, embedding_size]`
///
/// Sentence embeddings are the masked mean of the token embeddings, L2-normalised.
#[derive(Debug)]
pub struct OnnxEncoder {
    name: String,
    tokenizer: TokenizerAdapter,
    session: Session,
    characteristics: ModelCharacteristics,
    wants_token_type_ids: bool,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxEncoder>();
    }
};

impl OnnxEncoder {
    /// Loads a built-in encoder that the `ModelManager` has already downloaded.
    pub fn from_builtin(
        manager: &ModelManager,
        model: BuiltinModel,
        runtime: &RuntimeConfig,
    ) -> Result<Self> {
        manager.require_downloaded(model)?;
        Self::from_files(
            model.name(),
            manager.get_model_path(model),
            manager.get_tokenizer_path(model),
            model.characteristics(),
            runtime,
        )
    }

    pub fn from_files(
        name: impl Into<String>,
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        characteristics: ModelCharacteristics,
        runtime: &RuntimeConfig,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();
        if !model_path.exists() {
            return Err(SentimentError::ModelError(format!("Model file not found: {:?}", model_path)));
        }
        if !tokenizer_path.exists() {
            return Err(SentimentError::TokenizerError(format!(
                "Tokenizer file not found: {:?}",
                tokenizer_path
            )));
        }

        let tokenizer = TokenizerAdapter::from_file(tokenizer_path, characteristics.max_sequence_length)?;
        log::info!("Tokenizer loaded successfully");

        let session = load_session(runtime, model_path)?;
        Self::validate_model(&session)?;
        let wants_token_type_ids = session.inputs.iter().any(|input| input.name == "token_type_ids");

        Ok(Self {
            name: name.into(),
            tokenizer,
            session,
            characteristics,
            wants_token_type_ids,
        })
    }

    pub fn tokenizer(&self) -> &TokenizerAdapter {
        &self.tokenizer
    }

    pub fn characteristics(&self) -> &ModelCharacteristics {
        &self.characteristics
    }

    pub fn tokenize_review(&self, review: &ReviewRecord) -> Result<TokenizedReview> {
        self.tokenizer.tokenize_review(review)
    }

    /// Runs the encoder on an already tokenized sequence.
    pub fn embed(&self, input: &TokenizedInput) -> Result<Vec<f32>> {
        let len = input.len();
        let to_row = |values: &[u32]| {
            Array2::from_shape_vec((1, len), values.iter().map(|&x| x as i64).collect())
                .map_err(|e| SentimentError::ModelError(format!("Failed to create input array: {}", e)))
        };

        let mut input_tensors = HashMap::new();
        input_tensors.insert("input_ids", Tensor::from_array(to_row(&input.input_ids)?)?);
        input_tensors.insert("attention_mask", Tensor::from_array(to_row(&input.attention_mask)?)?);
        if self.wants_token_type_ids {
            input_tensors.insert("token_type_ids", Tensor::from_array(to_row(&input.type_ids)?)?);
        }

        let outputs = self.session.run(input_tensors)?;
        let token_embeddings = outputs[0]
            .try_extract_tensor::<f32>()?
            .into_dimensionality::<Ix3>()
            .map_err(|e| SentimentError::ModelError(format!("Unexpected encoder output shape: {}", e)))?;

        let hidden = token_embeddings.shape()[2];
        if hidden != self.characteristics.embedding_size {
            return Err(SentimentError::ModelError(format!(
                "Encoder produced {}-dim embeddings, expected {}",
                hidden, self.characteristics.embedding_size
            )));
        }

        let pooled = mean_pool(token_embeddings.index_axis(ndarray::Axis(0), 0), &input.attention_mask);
        Ok(normalize_vector(&pooled).to_vec())
    }

    /// Validates that the model has the expected input/output structure
    fn validate_model(session: &Session) -> Result<()> {
        for required in ["input_ids", "attention_mask"] {
            if !session.inputs.iter().any(|input| input.name == required) {
                return Err(SentimentError::ModelError(format!(
                    "Model is missing the '{}' input",
                    required
                )));
            }
        }
        if session.outputs.is_empty() {
            return Err(SentimentError::ModelError(
                "Model must have at least 1 output for token embeddings".to_string(),
            ));
        }
        Ok(())
    }
}

impl SentenceEncoder for OnnxEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn embedding_size(&self) -> usize {
        self.characteristics.embedding_size
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let input = self.tokenizer.tokenize(text)?;
        self.embed(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxEncoder::from_files(
            "missing",
            dir.path().join("model.onnx"),
            dir.path().join("tokenizer.json"),
            BuiltinModel::MiniLM.characteristics(),
            &RuntimeConfig::default(),
        );
        assert!(matches!(result, Err(SentimentError::ModelError(_))));
    }

    #[test]
    fn test_builtin_requires_download() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        let result = OnnxEncoder::from_builtin(&manager, BuiltinModel::MiniLM, &RuntimeConfig::default());
        assert!(matches!(result, Err(SentimentError::Provisioning(_))));
    }

    #[tokio::test]
    #[ignore = "downloads the encoder from the Hugging Face hub"]
    async fn test_minilm_embeddings() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let manager = ModelManager::new_default()?;
        manager.ensure_model_downloaded(BuiltinModel::MiniLM).await?;
        let encoder = OnnxEncoder::from_builtin(&manager, BuiltinModel::MiniLM, &RuntimeConfig::default())?;

        let embedding = encoder.encode("The movie was awesome!!!")?;
        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);

        // Inputs beyond 256 tokens are truncated, not rejected
        let long_text = "terrible ".repeat(2000);
        assert_eq!(encoder.encode(&long_text)?.len(), 384);
        assert_eq!(encoder.encode("")?.len(), 384);
        Ok(())
    }
}
