use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentimentError};

/// Number of output classes of the classification head
pub const NUM_LABELS: usize = 2;

/// The two sentiment categories. The discriminant is the class index used
/// by the corpus labels and the head's logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Negative = 0,
    Positive = 1,
}

impl Sentiment {
    pub const ALL: [Sentiment; NUM_LABELS] = [Sentiment::Negative, Sentiment::Positive];

    pub fn class_index(self) -> usize {
        self as usize
    }

    pub fn from_class_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Sentiment::Negative),
            1 => Some(Sentiment::Positive),
            _ => None,
        }
    }

    /// Maps a raw corpus label (0 = negative, 1 = positive).
    pub fn from_label_id(id: i64) -> Result<Self> {
        usize::try_from(id)
            .ok()
            .and_then(Self::from_class_index)
            .ok_or_else(|| SentimentError::DatasetError(format!("Unknown label id {}", id)))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Positive => "POSITIVE",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled review drawn from the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub text: String,
    pub label: Sentiment,
}

impl ReviewRecord {
    pub fn new(text: impl Into<String>, label: Sentiment) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Output of a single inference call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Sentiment,
    /// Softmax probability of `label`, the larger of the two class probabilities
    pub score: f32,
}

impl Prediction {
    /// Picks the most probable class from a pair of class probabilities.
    /// Ties resolve to `Negative`.
    pub fn from_probabilities(probabilities: [f32; NUM_LABELS]) -> Self {
        let [negative, positive] = probabilities;
        if positive > negative {
            Prediction { label: Sentiment::Positive, score: positive }
        } else {
            Prediction { label: Sentiment::Negative, score: negative }
        }
    }
}
