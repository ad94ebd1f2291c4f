//! Fine-tuning loop for the sentiment head.

use std::path::PathBuf;

use candle_core::Device;
use candle_nn::{Optimizer, VarMap};
use serde::{Deserialize, Serialize};

use super::checkpoint::{CheckpointMetadata, CheckpointStore};
use super::data::{BatchIterator, EncodedSplit};
use super::metrics::{evaluate_logits, EvaluationReport};
use crate::classifier::SentimentHead;
use crate::error::{Result, SentimentError};

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub lr: f64,
    pub weight_decay: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub seed: u64,
    /// Write a step checkpoint every this many optimizer steps; 0 disables them
    pub save_steps: usize,
    /// Maximum step checkpoints kept on disk; `None` keeps all
    pub save_total_limit: Option<usize>,
    pub output_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            weight_decay: 1e-2,
            batch_size: 16,
            epochs: 2,
            seed: 42,
            save_steps: 500,
            save_total_limit: Some(2),
            output_dir: PathBuf::from("sentiment-model"),
        }
    }
}

/// Per-epoch metrics logged during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub eval: EvaluationReport,
}

pub struct TrainOutcome {
    pub head: SentimentHead,
    pub history: Vec<EpochMetrics>,
    pub global_step: usize,
    /// Directory holding the final model
    pub model_dir: PathBuf,
}

impl TrainOutcome {
    pub fn final_eval(&self) -> Option<&EvaluationReport> {
        self.history.last().map(|m| &m.eval)
    }
}

/// Trains a [`SentimentHead`] on pre-computed sentence embeddings.
pub struct Trainer {
    config: TrainConfig,
    encoder_name: String,
    device: Device,
}

impl Trainer {
    pub fn new(config: TrainConfig, encoder_name: impl Into<String>) -> Self {
        Self {
            config,
            encoder_name: encoder_name.into(),
            device: Device::Cpu,
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Runs the full loop: fixed number of epochs, AdamW on cross-entropy,
    /// step checkpoints every `save_steps`, evaluation after each epoch,
    /// and the final model written to `output_dir`.
    pub fn train(&self, train: &EncodedSplit, eval: &EncodedSplit) -> Result<TrainOutcome> {
        let config = &self.config;
        if train.is_empty() {
            return Err(SentimentError::TrainingError("Training set is empty".to_string()));
        }
        if config.epochs == 0 {
            return Err(SentimentError::TrainingError("epochs must be at least 1".to_string()));
        }

        let embedding_size = train.inputs.dim(1)?;
        let varmap = VarMap::new();
        let head = SentimentHead::new_trainable(&varmap, embedding_size, &self.device)?;

        let mut optimizer = candle_nn::AdamW::new(
            varmap.all_vars(),
            candle_nn::ParamsAdamW {
                lr: config.lr,
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )?;

        let mut store = CheckpointStore::new(&config.output_dir, config.save_total_limit);
        let mut batches = BatchIterator::new(train, config.batch_size);
        let mut history: Vec<EpochMetrics> = Vec::with_capacity(config.epochs);
        let mut global_step = 0usize;

        log::info!(
            "Training: {} train / {} eval samples, lr={}, wd={}, batch={}, epochs={}, steps/epoch={}",
            train.len(),
            eval.len(),
            config.lr,
            config.weight_decay,
            config.batch_size,
            config.epochs,
            batches.batches_per_epoch(),
        );

        for epoch in 0..config.epochs {
            batches.reshuffle(config.seed, epoch);

            let mut epoch_loss = 0.0;
            let mut batch_count = 0usize;

            while let Some((batch_inputs, batch_labels)) = batches.next_batch()? {
                let logits = head.forward_logits(&batch_inputs)?;
                let loss = candle_nn::loss::cross_entropy(&logits, &batch_labels)?;
                optimizer.backward_step(&loss)?;

                epoch_loss += loss.to_scalar::<f32>()? as f64;
                batch_count += 1;
                global_step += 1;

                if config.save_steps > 0 && global_step % config.save_steps == 0 {
                    let metadata = CheckpointMetadata::new(global_step, epoch, &self.encoder_name, embedding_size);
                    store.save_step(&varmap, &metadata)?;
                }
            }

            let train_loss = if batch_count > 0 {
                epoch_loss / batch_count as f64
            } else {
                0.0
            };

            let eval_report = if eval.is_empty() {
                EvaluationReport::empty()
            } else {
                evaluate_logits(&head.forward_logits(&eval.inputs)?, &eval.labels)?
            };

            log::info!(
                "epoch {:3} | step {} | train_loss={:.4} | {}",
                epoch + 1,
                global_step,
                train_loss,
                eval_report,
            );

            history.push(EpochMetrics {
                epoch: epoch + 1,
                train_loss,
                eval: eval_report,
            });
        }

        let mut metadata = CheckpointMetadata::new(global_step, config.epochs, &self.encoder_name, embedding_size);
        metadata.accuracy = history.last().filter(|m| m.eval.total > 0).map(|m| m.eval.accuracy);
        let model_dir = store.save_final(&varmap, &metadata)?;

        Ok(TrainOutcome {
            head,
            history,
            global_step,
            model_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::Sentiment;

    fn separable_split(n: usize) -> EncodedSplit {
        let mut embeddings = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let strength = 0.5 + (i % 5) as f32 * 0.1;
            if i % 2 == 0 {
                embeddings.push(vec![strength, 0.1]);
                labels.push(Sentiment::Positive);
            } else {
                embeddings.push(vec![0.1, strength]);
                labels.push(Sentiment::Negative);
            }
        }
        EncodedSplit::from_embeddings(&embeddings, &labels, 2, &Device::Cpu).unwrap()
    }

    fn test_config(output_dir: PathBuf) -> TrainConfig {
        TrainConfig {
            lr: 0.1,
            batch_size: 4,
            epochs: 5,
            save_steps: 10,
            output_dir,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_train_config_default() {
        let cfg = TrainConfig::default();
        assert!((cfg.lr - 1e-3).abs() < 1e-12);
        assert_eq!(cfg.batch_size, 16);
        assert_eq!(cfg.epochs, 2);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.save_steps, 500);
        assert_eq!(cfg.save_total_limit, Some(2));
    }

    #[test]
    fn test_learns_separable_data() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(test_config(dir.path().to_path_buf()), "toy");
        let outcome = trainer.train(&separable_split(40), &separable_split(10)).unwrap();

        assert_eq!(outcome.history.len(), 5);
        assert_eq!(outcome.global_step, 50);
        let final_eval = outcome.final_eval().unwrap();
        assert_eq!(final_eval.total, 10);
        assert!(final_eval.accuracy >= 0.9, "accuracy {}", final_eval.accuracy);
        assert!(outcome.history[4].train_loss < outcome.history[0].train_loss);

        let prediction = outcome.head.predict(&[0.9, 0.1]).unwrap();
        assert_eq!(prediction.label, Sentiment::Positive);
    }

    #[test]
    fn test_writes_checkpoints_and_final_model() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(test_config(dir.path().to_path_buf()), "toy");
        let outcome = trainer.train(&separable_split(40), &separable_split(10)).unwrap();

        // 50 steps, one checkpoint every 10, only the newest 2 kept
        let store = CheckpointStore::new(dir.path(), None);
        let steps: Vec<usize> = store
            .list_step_checkpoints()
            .unwrap()
            .into_iter()
            .map(|(step, _)| step)
            .collect();
        assert_eq!(steps, vec![40, 50]);

        let metadata = CheckpointMetadata::read(&outcome.model_dir).unwrap();
        assert_eq!(metadata.step, 50);
        assert_eq!(metadata.encoder, "toy");
        assert_eq!(metadata.embedding_size, 2);
        assert!(metadata.accuracy.is_some());
    }

    #[test]
    fn test_training_is_reproducible() {
        let run = || {
            let dir = tempfile::tempdir().unwrap();
            let trainer = Trainer::new(test_config(dir.path().to_path_buf()), "toy");
            let outcome = trainer.train(&separable_split(20), &separable_split(6)).unwrap();
            outcome.head.probabilities(&[0.4, 0.6]).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_rejects_empty_training_set() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(test_config(dir.path().to_path_buf()), "toy");
        let empty = EncodedSplit::from_embeddings(&[], &[], 2, &Device::Cpu).unwrap();
        assert!(matches!(
            trainer.train(&empty, &empty),
            Err(SentimentError::TrainingError(_))
        ));
    }
}
