use std::io;

use crate::model_manager::ModelError;

/// Errors surfaced by the sentiment pipeline.
///
/// Collaborator failures (tokenizer, ONNX Runtime, candle, HTTP) are carried
/// through with their original message; nothing here retries or recovers.
#[derive(Debug, thiserror::Error)]
pub enum SentimentError {
    /// Error occurred while loading or using the tokenizer
    #[error("Tokenizer error: {0}")]
    TokenizerError(String),
    /// Error occurred while loading or running the ONNX encoder
    #[error("Model error: {0}")]
    ModelError(String),
    /// Error raised by the tensor library while training or scoring the head
    #[error("Tensor error: {0}")]
    TensorError(#[from] candle_core::Error),
    /// The corpus could not be fetched or contained unexpected rows
    #[error("Dataset error: {0}")]
    DatasetError(String),
    /// Invalid training input or configuration
    #[error("Training error: {0}")]
    TrainingError(String),
    /// A checkpoint directory is missing, incomplete or incompatible
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),
    /// The demo server failed to bind, serve or shut down
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Model provisioning error: {0}")]
    Provisioning(#[from] ModelError),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<ort::Error> for SentimentError {
    fn from(err: ort::Error) -> Self {
        SentimentError::ModelError(err.to_string())
    }
}

pub type Result<T, E = SentimentError> = std::result::Result<T, E>;
