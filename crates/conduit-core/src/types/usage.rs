use serde::{Deserialize, Serialize};

/// Token usage reported by the backend.
///
/// Missing counters deserialize as zero; cache counters stay `None` when the
/// backend omits them so they are not echoed downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
}

impl Usage {
    /// Create new usage info
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Fold a `message_delta` usage into this running total.
    ///
    /// `output_tokens` is cumulative on the wire, so the latest value wins.
    /// Input and cache counters only replace the current value when present.
    pub fn merge_delta(&mut self, delta: &Usage) {
        self.output_tokens = delta.output_tokens;
        if delta.input_tokens > 0 {
            self.input_tokens = delta.input_tokens;
        }
        if delta.cache_read_input_tokens.is_some() {
            self.cache_read_input_tokens = delta.cache_read_input_tokens;
        }
        if delta.cache_creation_input_tokens.is_some() {
            self.cache_creation_input_tokens = delta.cache_creation_input_tokens;
        }
    }
}
