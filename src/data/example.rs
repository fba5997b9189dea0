//! Pre-tokenized instruction example

use serde::{Deserialize, Serialize};

/// One tokenized prompt/response pair.
///
/// `input_ids[..seq_len - 1]` is the prompt; the response starts at
/// `seq_len - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Token ids of prompt followed by response
    pub input_ids: Vec<i64>,
    /// Prompt/response boundary marker
    pub seq_len: usize,
}

impl Example {
    /// Create an example
    #[must_use]
    pub fn new(input_ids: Vec<i64>, seq_len: usize) -> Self {
        Self { input_ids, seq_len }
    }

    /// Number of tokens
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Whether the example has no tokens
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Number of response tokens the loss is computed over (eos excluded)
    #[must_use]
    pub fn response_len(&self) -> usize {
        self.len().saturating_sub(self.seq_len.saturating_sub(1))
    }
}
