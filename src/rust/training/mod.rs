//! Fine-tuning pipeline for the sentiment head.
//!
//! The encoder is frozen: every review is embedded once, then a linear
//! 2-class head is trained on those embeddings with AdamW, evaluated after
//! each epoch and checkpointed every `save_steps` optimizer steps.

pub mod checkpoint;
pub mod data;
pub mod metrics;
pub mod trainer;

pub use checkpoint::{CheckpointMetadata, CheckpointStore};
pub use data::{BatchIterator, EncodedSplit};
pub use metrics::{accuracy, evaluate_logits, EvaluationReport};
pub use trainer::{EpochMetrics, TrainConfig, TrainOutcome, Trainer};
