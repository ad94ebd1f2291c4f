#![allow(dead_code)]

use std::path::Path;

use sentiment_tuner::dataset::write_jsonl;
use sentiment_tuner::{ReviewRecord, Result, Sentiment, SentenceEncoder};

const POSITIVE_WORDS: &[&str] = &["awesome", "great", "excellent", "good", "wonderful", "loved", "brilliant"];
const NEGATIVE_WORDS: &[&str] = &["bad", "horrible", "terrible", "awful", "boring", "worst", "hated"];

/// Offline stand-in for the ONNX encoder: `[positive hits, negative hits, 1]`.
pub struct KeywordEncoder {
    pub name: &'static str,
}

impl Default for KeywordEncoder {
    fn default() -> Self {
        Self { name: "keywords" }
    }
}

impl SentenceEncoder for KeywordEncoder {
    fn name(&self) -> &str {
        self.name
    }

    fn embedding_size(&self) -> usize {
        3
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut features = vec![0.0, 0.0, 1.0];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if POSITIVE_WORDS.contains(&word.as_str()) {
                features[0] += 1.0;
            } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                features[1] += 1.0;
            }
        }
        Ok(features)
    }
}

pub fn synthetic_reviews(n: usize, offset: usize) -> Vec<ReviewRecord> {
    let positive = ["great", "awesome", "wonderful", "loved", "brilliant", "excellent"];
    let negative = ["bad", "horrible", "boring", "hated", "awful", "terrible"];
    (0..n)
        .map(|i| {
            let k = i + offset;
            if k % 2 == 0 {
                let word = positive[k / 2 % positive.len()];
                ReviewRecord::new(format!("Review {}: the film was {}", k, word), Sentiment::Positive)
            } else {
                let word = negative[k / 2 % negative.len()];
                ReviewRecord::new(format!("Review {}: the film was {}", k, word), Sentiment::Negative)
            }
        })
        .collect()
}

/// Writes `train.jsonl` and `test.jsonl` in the layout `DatasetSource::local` reads.
pub fn write_local_corpus(dir: &Path, train: usize, test: usize) {
    write_jsonl(&dir.join("train.jsonl"), &synthetic_reviews(train, 0)).unwrap();
    write_jsonl(&dir.join("test.jsonl"), &synthetic_reviews(test, train)).unwrap();
}

pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}
