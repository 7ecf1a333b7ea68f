//! Gateway-side identifiers and timestamps
//!
//! Downstream responses never reuse the backend's raw message ids.

use uuid::Uuid;

/// Anthropic-style message id, e.g. `msg_4f1c...`
pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

/// OpenAI-style completion id, e.g. `chatcmpl-4f1c...`
pub fn new_completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

/// Seconds since the Unix epoch
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
