use std::path::Path;

use tokenizers::{Tokenizer, TruncationParams};

use crate::error::{Result, SentimentError};
use crate::sentiment::ReviewRecord;

/// Model-ready encoding of one text. Unpadded; every mask entry is 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedInput {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub type_ids: Vec<u32>,
}

impl TokenizedInput {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// A review together with its encoding
#[derive(Debug, Clone)]
pub struct TokenizedReview {
    pub review: ReviewRecord,
    pub input: TokenizedInput,
    /// Text did not fit in `max_sequence_length` and was cut
    pub truncated: bool,
}

/// Maps raw text to the encoder's token sequence.
///
/// Special tokens are added and the sequence is truncated to
/// `max_sequence_length`, so text of any length encodes without error.
/// Padding is left off; batches are never padded because the encoder runs
/// one sequence at a time.
#[derive(Debug, Clone)]
pub struct TokenizerAdapter {
    tokenizer: Tokenizer,
    /// Same vocabulary with truncation off, for `count_tokens`
    untruncated: Tokenizer,
    max_sequence_length: usize,
}

impl TokenizerAdapter {
    pub fn from_file(path: impl AsRef<Path>, max_sequence_length: usize) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path.as_ref()).map_err(|e| {
            log::error!("Failed to load tokenizer from {:?}: {}", path.as_ref(), e);
            SentimentError::TokenizerError(format!("Failed to load tokenizer: {}", e))
        })?;
        Self::new(tokenizer, max_sequence_length)
    }

    pub fn new(mut tokenizer: Tokenizer, max_sequence_length: usize) -> Result<Self> {
        // [CLS] and [SEP] alone take two positions
        if max_sequence_length < 2 {
            return Err(SentimentError::TokenizerError(format!(
                "max_sequence_length must leave room for special tokens (got {})",
                max_sequence_length
            )));
        }

        tokenizer.with_padding(None);
        let mut untruncated = tokenizer.clone();
        untruncated
            .with_truncation(None)
            .map_err(|e| SentimentError::TokenizerError(e.to_string()))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| SentimentError::TokenizerError(e.to_string()))?;

        Ok(Self {
            tokenizer,
            untruncated,
            max_sequence_length,
        })
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    pub fn tokenize(&self, text: &str) -> Result<TokenizedInput> {
        self.encode(text).map(|(input, _)| input)
    }

    pub fn tokenize_review(&self, review: &ReviewRecord) -> Result<TokenizedReview> {
        let (input, truncated) = self.encode(&review.text)?;
        Ok(TokenizedReview {
            review: review.clone(),
            input,
            truncated,
        })
    }

    fn encode(&self, text: &str) -> Result<(TokenizedInput, bool)> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| SentimentError::TokenizerError(e.to_string()))?;
        // Truncation moves the cut tail into the overflow list
        let truncated = !encoding.get_overflowing().is_empty();

        let input = TokenizedInput {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            type_ids: encoding.get_type_ids().to_vec(),
        };
        Ok((input, truncated))
    }

    /// Counts tokens without truncation or special tokens.
    ///
    /// Useful for reporting how much of a corpus gets truncated.
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        self.untruncated
            .encode(text, false)
            .map(|encoding| encoding.get_ids().len())
            .map_err(|e| SentimentError::TokenizerError(e.to_string()))
    }
}
