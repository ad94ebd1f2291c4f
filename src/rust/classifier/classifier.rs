use std::path::Path;
use std::sync::Arc;

use candle_core::Device;

use super::encoder::SentenceEncoder;
use super::head::SentimentHead;
use crate::error::{Result, SentimentError};
use crate::sentiment::{Prediction, ReviewRecord};
use crate::training::checkpoint::{CheckpointMetadata, WEIGHTS_FILE};
use crate::training::data::EncodedSplit;
use crate::training::metrics::{evaluate_logits, EvaluationReport};

/// Text-to-sentiment inference: encoder followed by the fine-tuned head.
///
/// Parameters are fixed once constructed, so `predict` is a pure function of
/// its input and the classifier can be shared across threads with `Arc`.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use sentiment_tuner::{BuiltinModel, ModelManager, OnnxEncoder, RuntimeConfig, SentimentClassifier};
///
/// let manager = ModelManager::new_default()?;
/// let encoder = OnnxEncoder::from_builtin(&manager, BuiltinModel::MiniLM, &RuntimeConfig::default())?;
/// let classifier = SentimentClassifier::load("sentiment-model", Arc::new(encoder))?;
///
/// let prediction = classifier.predict("The movie was awesome!!!")?;
/// println!("{} ({:.3})", prediction.label, prediction.score);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SentimentClassifier {
    encoder: Arc<dyn SentenceEncoder>,
    head: SentimentHead,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<SentimentClassifier>();
    }
};

impl std::fmt::Debug for SentimentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentClassifier")
            .field("encoder", &self.encoder.name())
            .field("embedding_size", &self.head.embedding_size())
            .finish()
    }
}

impl SentimentClassifier {
    pub fn new(encoder: Arc<dyn SentenceEncoder>, head: SentimentHead) -> Result<Self> {
        if encoder.embedding_size() != head.embedding_size() {
            return Err(SentimentError::ModelError(format!(
                "Encoder '{}' produces {}-dim embeddings but the head expects {}",
                encoder.name(),
                encoder.embedding_size(),
                head.embedding_size()
            )));
        }
        Ok(Self { encoder, head })
    }

    /// Restores a classifier from a directory written by the trainer
    /// (the final model or any `checkpoint-<step>` directory).
    ///
    /// Fails if the checkpoint was trained on a different encoder.
    pub fn load(model_dir: impl AsRef<Path>, encoder: Arc<dyn SentenceEncoder>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let metadata = CheckpointMetadata::read(model_dir)?;
        if metadata.encoder != encoder.name() {
            return Err(SentimentError::CheckpointError(format!(
                "Checkpoint in {:?} was trained on encoder '{}', not '{}'",
                model_dir,
                metadata.encoder,
                encoder.name()
            )));
        }

        let head = SentimentHead::load(&model_dir.join(WEIGHTS_FILE), metadata.embedding_size, &Device::Cpu)?;
        log::info!(
            "Loaded sentiment head from {:?} (step {}, accuracy {:?})",
            model_dir,
            metadata.step,
            metadata.accuracy
        );
        Self::new(encoder, head)
    }

    pub fn encoder(&self) -> &dyn SentenceEncoder {
        self.encoder.as_ref()
    }

    pub fn head(&self) -> &SentimentHead {
        &self.head
    }

    /// Returns the most probable sentiment and its softmax probability.
    ///
    /// Any string is accepted: empty text encodes to special tokens only and
    /// text beyond the encoder's maximum length is truncated. One call runs
    /// exactly one forward pass.
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let embedding = self.encoder.encode(text)?;
        self.head.predict(&embedding)
    }

    /// Scores labeled reviews in one batch through the head.
    pub fn evaluate(&self, records: &[ReviewRecord]) -> Result<EvaluationReport> {
        if records.is_empty() {
            return Ok(EvaluationReport::empty());
        }
        let split = EncodedSplit::encode(self.encoder.as_ref(), records, self.head.device())?;
        evaluate_logits(&self.head.forward_logits(&split.inputs)?, &split.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::Sentiment;
    use crate::test_support::{lexicon_head, LexiconEncoder};

    fn classifier() -> SentimentClassifier {
        SentimentClassifier::new(Arc::new(LexiconEncoder), lexicon_head()).unwrap()
    }

    #[test]
    fn test_predict_scenarios() {
        let classifier = classifier();

        let positive = classifier.predict("The movie was awesome!!!").unwrap();
        assert_eq!(positive.label, Sentiment::Positive);
        assert!(positive.score > 0.5);

        let negative = classifier.predict("Acting was bad and the plot was horrible").unwrap();
        assert_eq!(negative.label, Sentiment::Negative);
        assert!(negative.score > 0.5);
    }

    #[test]
    fn test_predict_accepts_any_text() {
        let classifier = classifier();
        let long_text = "word ".repeat(10_000);
        for text in ["", "   ", "¿qué?", long_text.as_str()] {
            let prediction = classifier.predict(text).unwrap();
            assert!(Sentiment::ALL.contains(&prediction.label));
            assert!((0.0..=1.0).contains(&prediction.score));
        }
    }

    #[test]
    fn test_predict_is_deterministic() {
        let classifier = classifier();
        let text = "great film but bad ending";
        assert_eq!(classifier.predict(text).unwrap(), classifier.predict(text).unwrap());
    }

    #[test]
    fn test_evaluate_counts_correct_predictions() {
        let classifier = classifier();
        let records = vec![
            ReviewRecord::new("great", Sentiment::Positive),
            ReviewRecord::new("horrible", Sentiment::Negative),
            ReviewRecord::new("awesome", Sentiment::Negative),
            ReviewRecord::new("bad bad", Sentiment::Negative),
        ];
        let report = classifier.evaluate(&records).unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.correct, 3);
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(classifier.evaluate(&[]).unwrap(), EvaluationReport::empty());
    }

    #[test]
    fn test_rejects_mismatched_head() {
        let head = SentimentHead::from_parameters(vec![0.0; 6], vec![0.0; 2], 3, &Device::Cpu).unwrap();
        assert!(SentimentClassifier::new(Arc::new(LexiconEncoder), head).is_err());
    }
}
