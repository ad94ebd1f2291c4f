//! End-to-end fine-tuning run: provision the encoder, draw the samples,
//! embed them, train the head, evaluate and persist.

use std::sync::Arc;

use candle_core::Device;

use crate::classifier::{OnnxEncoder, SentenceEncoder, SentimentClassifier, TokenizedReview};
use crate::dataset::{load_samples, DatasetSamples, DatasetSource, SampleCache, SampleConfig};
use crate::error::{Result, SentimentError};
use crate::model_manager::ModelManager;
use crate::models::BuiltinModel;
use crate::runtime::RuntimeConfig;
use crate::sentiment::{ReviewRecord, Sentiment};
use crate::training::{EncodedSplit, EvaluationReport, TrainConfig, TrainOutcome, Trainer};

/// Token length summary of a tokenized split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenStats {
    pub reviews: usize,
    /// Reviews cut to the encoder's maximum sequence length
    pub truncated: usize,
    /// Longest model input, special tokens included
    pub longest_input: usize,
}

impl TokenStats {
    pub fn collect(reviews: &[TokenizedReview]) -> Self {
        reviews.iter().fold(
            TokenStats {
                reviews: reviews.len(),
                ..Default::default()
            },
            |mut stats, review| {
                stats.longest_input = stats.longest_input.max(review.input.len());
                stats.truncated += usize::from(review.truncated);
                stats
            },
        )
    }
}

/// Result of [`fine_tune`].
pub struct FineTuneRun {
    pub classifier: SentimentClassifier,
    pub outcome: TrainOutcome,
    /// Accuracy of the final head on the test sample
    pub test_report: EvaluationReport,
}

/// Embeds both samples with the frozen `encoder`, trains the head and
/// evaluates it on the test sample.
pub fn fine_tune(
    encoder: Arc<dyn SentenceEncoder>,
    samples: &DatasetSamples,
    config: TrainConfig,
) -> Result<FineTuneRun> {
    let trainer = Trainer::new(config, encoder.name());

    log::info!("Embedding {} training reviews with '{}'", samples.train.len(), encoder.name());
    let train = EncodedSplit::encode(encoder.as_ref(), &samples.train, trainer.device())?;
    log::info!("Embedding {} test reviews", samples.test.len());
    let test = EncodedSplit::encode(encoder.as_ref(), &samples.test, trainer.device())?;

    train_encoded(encoder, &trainer, &train, &test)
}

fn train_encoded(
    encoder: Arc<dyn SentenceEncoder>,
    trainer: &Trainer,
    train: &EncodedSplit,
    test: &EncodedSplit,
) -> Result<FineTuneRun> {
    let outcome = trainer.train(train, test)?;
    let test_report = outcome.final_eval().cloned().unwrap_or_else(EvaluationReport::empty);
    log::info!("Final test evaluation: {}", test_report);
    log::info!("Model saved to {:?}", outcome.model_dir);

    let classifier = SentimentClassifier::new(encoder, outcome.head.clone())?;
    Ok(FineTuneRun {
        classifier,
        outcome,
        test_report,
    })
}

/// Tokenizes each review once, logs the token statistics, then embeds the
/// token sequences.
fn embed_split(encoder: &OnnxEncoder, split: &str, records: &[ReviewRecord], device: &Device) -> Result<EncodedSplit> {
    let tokenized = records
        .iter()
        .map(|record| encoder.tokenize_review(record))
        .collect::<Result<Vec<_>>>()?;
    let stats = TokenStats::collect(&tokenized);
    log::info!(
        "Tokenized {} {} reviews: longest input {} tokens, {} truncated to {}",
        stats.reviews,
        split,
        stats.longest_input,
        stats.truncated,
        encoder.tokenizer().max_sequence_length()
    );

    log::info!("Embedding {} {} reviews with '{}'", tokenized.len(), split, encoder.name());
    let embeddings = tokenized
        .iter()
        .map(|review| encoder.embed(&review.input))
        .collect::<Result<Vec<_>>>()?;
    let labels: Vec<Sentiment> = tokenized.iter().map(|review| review.review.label).collect();
    EncodedSplit::from_embeddings(&embeddings, &labels, encoder.embedding_size(), device)
}

/// Everything needed for a full training run from a clean machine.
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    pub model: BuiltinModel,
    pub runtime: RuntimeConfig,
    pub source: DatasetSource,
    pub sample: SampleConfig,
    pub train: TrainConfig,
    /// Reuse and store drawn samples under this cache; `None` always refetches
    pub cache: Option<SampleCache>,
}

impl TrainingPipeline {
    pub async fn run(self, manager: &ModelManager) -> Result<FineTuneRun> {
        manager.ensure_model_downloaded(self.model).await?;
        let encoder = OnnxEncoder::from_builtin(manager, self.model, &self.runtime)?;

        let samples = load_samples(&self.source, &self.sample, self.cache.as_ref()).await?;

        let config = self.train;
        tokio::task::spawn_blocking(move || {
            let trainer = Trainer::new(config, encoder.name());
            let train = embed_split(&encoder, "train", &samples.train, trainer.device())?;
            let test = embed_split(&encoder, "test", &samples.test, trainer.device())?;
            train_encoded(Arc::new(encoder), &trainer, &train, &test)
        })
        .await
        .map_err(|e| SentimentError::TrainingError(format!("Training task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TokenizerAdapter;
    use crate::test_support::LexiconEncoder;
    use crate::training::CheckpointMetadata;
    use std::str::FromStr;

    fn reviews(n: usize) -> Vec<ReviewRecord> {
        let positive = ["great film", "awesome acting", "wonderful and brilliant", "loved it, excellent"];
        let negative = ["bad film", "horrible acting", "boring and awful", "hated it, terrible"];
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ReviewRecord::new(positive[i / 2 % positive.len()], Sentiment::Positive)
                } else {
                    ReviewRecord::new(negative[i / 2 % negative.len()], Sentiment::Negative)
                }
            })
            .collect()
    }

    #[test]
    fn test_fine_tune_learns_lexicon() {
        let dir = tempfile::tempdir().unwrap();
        let samples = DatasetSamples {
            train: reviews(32),
            test: reviews(8),
        };
        let config = TrainConfig {
            lr: 0.1,
            batch_size: 8,
            epochs: 10,
            save_steps: 0,
            output_dir: dir.path().to_path_buf(),
            ..TrainConfig::default()
        };

        let run = fine_tune(Arc::new(LexiconEncoder), &samples, config).unwrap();
        assert_eq!(run.test_report.total, 8);
        assert!(run.test_report.accuracy >= 0.99, "{}", run.test_report);
        assert_eq!(run.classifier.predict("The movie was awesome!!!").unwrap().label, Sentiment::Positive);
        assert_eq!(
            run.classifier.predict("Acting was bad and the plot was horrible").unwrap().label,
            Sentiment::Negative
        );

        let metadata = CheckpointMetadata::read(dir.path()).unwrap();
        assert_eq!(metadata.encoder, "lexicon");
        assert_eq!(metadata.step, run.outcome.global_step);
    }

    #[test]
    fn test_token_stats_counts_truncation() {
        let tokenizer = tokenizers::Tokenizer::from_str(include_str!("../../tests/fixtures/tokenizer.json")).unwrap();
        let adapter = TokenizerAdapter::new(tokenizer, 6).unwrap();
        let tokenized: Vec<TokenizedReview> = [
            ReviewRecord::new("great film", Sentiment::Positive),
            ReviewRecord::new("the movie was bad", Sentiment::Negative),
            ReviewRecord::new("the movie was bad and the acting was horrible", Sentiment::Negative),
        ]
        .iter()
        .map(|record| adapter.tokenize_review(record).unwrap())
        .collect();

        let stats = TokenStats::collect(&tokenized);
        assert_eq!(stats.reviews, 3);
        assert_eq!(stats.truncated, 1);
        assert_eq!(stats.longest_input, 6);
        assert_eq!(TokenStats::collect(&[]), TokenStats::default());
    }
}
