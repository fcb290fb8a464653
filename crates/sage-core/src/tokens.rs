//! Token counting with model-specific BPE tokenization

use thiserror::Error;
use tiktoken_rs::CoreBPE;

/// Errors that can occur while initializing a tokenizer
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// Failed to load the BPE ranks for the tokenizer
    #[error("failed to initialize tokenizer: {0}")]
    Init(String),
}

/// Maps text to a token count.
///
/// Implementations must be deterministic and side-effect free: the same
/// text always counts to the same number, and counting never fails.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a text string
    fn count(&self, text: &str) -> usize;
}

/// Token counter backed by the tokenization scheme of a specific model.
///
/// Unrecognized model ids fall back to the `cl100k_base` encoding, which
/// is approximate for such models but consistent across calls.
pub struct BpeTokenCounter {
    bpe: CoreBPE,
}

impl BpeTokenCounter {
    /// Create a counter using the tokenization rules for the given model id
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .or_else(|_| tiktoken_rs::cl100k_base())
            .map_err(|e| TokenizerError::Init(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }
}
