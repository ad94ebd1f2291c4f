//! Accuracy evaluation for the sentiment head.

use std::fmt;

use candle_core::{Tensor, D};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentimentError};

/// Outcome of scoring a held-out set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// `correct / total`, 0.0 for an empty set
    pub accuracy: f64,
    pub correct: usize,
    pub total: usize,
    /// Mean cross-entropy, absent when the set is empty
    pub loss: Option<f64>,
}

impl EvaluationReport {
    pub fn empty() -> Self {
        Self {
            accuracy: 0.0,
            correct: 0,
            total: 0,
            loss: None,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "accuracy={:.4} ({}/{})", self.accuracy, self.correct, self.total)?;
        if let Some(loss) = self.loss {
            write!(f, " loss={:.4}", loss)?;
        }
        Ok(())
    }
}

/// Exact-match accuracy between predictions and reference labels.
pub fn accuracy<T: PartialEq>(predictions: &[T], references: &[T]) -> Result<(usize, f64)> {
    if predictions.len() != references.len() {
        return Err(SentimentError::TrainingError(format!(
            "predictions ({}) and references ({}) must have the same length",
            predictions.len(),
            references.len()
        )));
    }
    let correct = predictions
        .iter()
        .zip(references)
        .filter(|(p, r)| p == r)
        .count();
    let total = predictions.len();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    Ok((correct, accuracy))
}

/// Scores `[N, 2]` logits against `[N]` class-index labels: argmax accuracy
/// plus mean cross-entropy.
pub fn evaluate_logits(logits: &Tensor, labels: &Tensor) -> Result<EvaluationReport> {
    let total = labels.dim(0)?;
    if total == 0 {
        return Ok(EvaluationReport::empty());
    }

    let loss = candle_nn::loss::cross_entropy(logits, labels)?.to_scalar::<f32>()? as f64;
    let predictions: Vec<u32> = logits.argmax(D::Minus1)?.to_vec1()?;
    let references: Vec<u32> = labels.to_vec1()?;
    let (correct, accuracy) = accuracy(&predictions, &references)?;

    Ok(EvaluationReport {
        accuracy,
        correct,
        total,
        loss: Some(loss),
    })
}
