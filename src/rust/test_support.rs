//! Lexicon-based stand-ins for the ONNX encoder, used by unit tests.

use candle_core::Device;

use crate::classifier::{SentenceEncoder, SentimentHead};
use crate::error::Result;

const POSITIVE_WORDS: &[&str] = &["awesome", "great", "excellent", "good", "wonderful", "loved", "brilliant"];
const NEGATIVE_WORDS: &[&str] = &["bad", "horrible", "terrible", "awful", "boring", "worst", "hated"];

/// Embeds text as `[positive word count, negative word count]`.
pub(crate) struct LexiconEncoder;

impl SentenceEncoder for LexiconEncoder {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn embedding_size(&self) -> usize {
        2
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut counts = [0.0f32; 2];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if POSITIVE_WORDS.contains(&word.as_str()) {
                counts[0] += 1.0;
            } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                counts[1] += 1.0;
            }
        }
        Ok(counts.to_vec())
    }
}

/// Head that follows the lexicon counts: positive count drives class 1,
/// negative count drives class 0.
pub(crate) fn lexicon_head() -> SentimentHead {
    SentimentHead::from_parameters(vec![0.0, 2.0, 2.0, 0.0], vec![0.0, 0.0], 2, &Device::Cpu)
        .expect("valid lexicon head parameters")
}
