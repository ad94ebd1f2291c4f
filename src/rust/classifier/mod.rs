//! Inference side of the pipeline: tokenizer adapter, frozen encoder,
//! classification head and the text-to-sentiment classifier built from them.

mod classifier;
mod encoder;
mod head;
mod tokenizer;
mod utils;

pub use classifier::SentimentClassifier;
pub use encoder::{OnnxEncoder, SentenceEncoder};
pub use head::SentimentHead;
pub use tokenizer::{TokenizedInput, TokenizedReview, TokenizerAdapter};
