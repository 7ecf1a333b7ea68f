//! Shared types for the Conduit gateway
//!
//! - [`event`]: the line-delimited event protocol spoken by the backend process
//! - [`types`]: content blocks, usage and stop reasons shared by both downstream protocols
//! - [`ids`]: gateway-owned identifiers

pub mod event;
pub mod ids;
pub mod types;

pub use event::{
    AssistantEvent, AssistantMessage, BackendEvent, MessageDeltaBody, MessageStartBody,
    ResultEvent, StreamEnvelope, StreamSubEvent, SystemEvent, UserEnvelope, UserEvent,
};
pub use types::{map_finish_reason, BlockDelta, ContentBlock, FinishReason, StopReason, Usage};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
