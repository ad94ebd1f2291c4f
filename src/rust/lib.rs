//! Fine-tunes a pre-trained sentence encoder into a binary movie-review
//! sentiment classifier and serves it behind a small demo form.
//!
//! The encoder (MiniLM, executed by ONNX Runtime) is frozen; a linear
//! NEGATIVE/POSITIVE head is trained on its sentence embeddings with AdamW.
//!
//! # Basic Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use sentiment_tuner::{ModelManager, TrainingPipeline};
//!
//! let manager = ModelManager::new_default()?;
//! let run = TrainingPipeline::default().run(&manager).await?;
//! println!("test {}", run.test_report);
//!
//! let prediction = run.classifier.predict("The movie was awesome!!!")?;
//! println!("{} ({:.3})", prediction.label, prediction.score);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A [`SentimentClassifier`] is immutable once built and can be shared across
//! threads using `Arc`. The demo server does exactly that, while still
//! answering one inference request at a time.

pub mod classifier;
pub mod dataset;
pub mod error;
pub mod model_manager;
pub mod models;
pub mod pipeline;
mod runtime;
pub mod sentiment;
pub mod server;
pub mod training;

#[cfg(test)]
mod test_support;

pub use classifier::{OnnxEncoder, SentenceEncoder, SentimentClassifier, SentimentHead, TokenizerAdapter};
pub use dataset::{load_samples, DatasetSamples, DatasetSource, SampleCache, SampleConfig};
pub use error::{Result, SentimentError};
pub use model_manager::{default_cache_root, ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use pipeline::{fine_tune, FineTuneRun, TokenStats, TrainingPipeline};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use sentiment::{Prediction, ReviewRecord, Sentiment};
pub use server::{DemoHandle, DemoServer, ServerConfig};
pub use training::{EvaluationReport, TrainConfig, Trainer};

pub fn init_logger() {
    env_logger::init();
}
