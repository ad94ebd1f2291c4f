//! Embedded datasets and mini-batch iteration for head training.

use candle_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::classifier::SentenceEncoder;
use crate::error::{Result, SentimentError};
use crate::sentiment::{ReviewRecord, Sentiment};

/// Sentence embeddings `[N, E]` with their class-index labels `[N]` (u32).
#[derive(Debug, Clone)]
pub struct EncodedSplit {
    pub inputs: Tensor,
    pub labels: Tensor,
    len: usize,
}

impl EncodedSplit {
    pub fn from_embeddings(
        embeddings: &[Vec<f32>],
        labels: &[Sentiment],
        embedding_size: usize,
        device: &Device,
    ) -> Result<Self> {
        if embeddings.len() != labels.len() {
            return Err(SentimentError::TrainingError(format!(
                "{} embeddings but {} labels",
                embeddings.len(),
                labels.len()
            )));
        }
        if let Some(pos) = embeddings.iter().position(|e| e.len() != embedding_size) {
            return Err(SentimentError::TrainingError(format!(
                "Embedding {} has {} dimensions, expected {}",
                pos,
                embeddings[pos].len(),
                embedding_size
            )));
        }

        let len = embeddings.len();
        let flat: Vec<f32> = embeddings.iter().flatten().copied().collect();
        let class_ids: Vec<u32> = labels.iter().map(|l| l.class_index() as u32).collect();

        Ok(Self {
            inputs: Tensor::from_vec(flat, (len, embedding_size), device)?,
            labels: Tensor::from_vec(class_ids, len, device)?,
            len,
        })
    }

    /// Embeds every review with `encoder`, one forward pass each.
    pub fn encode(encoder: &dyn SentenceEncoder, records: &[ReviewRecord], device: &Device) -> Result<Self> {
        let embeddings = records
            .iter()
            .map(|record| encoder.encode(&record.text))
            .collect::<Result<Vec<_>>>()?;
        let labels: Vec<Sentiment> = records.iter().map(|r| r.label).collect();
        Self::from_embeddings(&embeddings, &labels, encoder.embedding_size(), device)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Mini-batch iterator over an [`EncodedSplit`]. Reshuffles indices each epoch.
pub struct BatchIterator<'a> {
    split: &'a EncodedSplit,
    indices: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl<'a> BatchIterator<'a> {
    pub fn new(split: &'a EncodedSplit, batch_size: usize) -> Self {
        Self {
            split,
            indices: (0..split.len()).collect(),
            batch_size: batch_size.max(1),
            pos: 0,
        }
    }

    /// Reshuffle for a new epoch using a seeded RNG derived from base seed + epoch.
    pub fn reshuffle(&mut self, seed: u64, epoch: usize) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
        self.indices.shuffle(&mut rng);
        self.pos = 0;
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// Returns the next mini-batch, or `None` once the epoch is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<(Tensor, Tensor)>> {
        let n = self.indices.len();
        if self.pos >= n {
            return Ok(None);
        }

        let end = (self.pos + self.batch_size).min(n);
        let batch_idx: Vec<u32> = self.indices[self.pos..end].iter().map(|&i| i as u32).collect();
        self.pos = end;

        let idx_tensor = Tensor::new(batch_idx.as_slice(), self.split.inputs.device())?;
        let batch_inputs = self.split.inputs.index_select(&idx_tensor, 0)?;
        let batch_labels = self.split.labels.index_select(&idx_tensor, 0)?;

        Ok(Some((batch_inputs, batch_labels)))
    }
}
