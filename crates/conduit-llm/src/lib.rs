//! OpenAI and Anthropic protocol translation for backend event streams.
//!
//! - [`adapters`]: request/response wire types for both downstream APIs
//! - [`transformer`]: streaming translators and the delivery → SSE driver
//! - [`aggregator`]: non-streaming response assembly
//! - [`prompt`]: conversation flattening into one backend prompt

pub mod adapters;
pub mod aggregator;
pub mod error;
pub mod prompt;
pub mod sse;
pub mod transformer;

pub use aggregator::ResponseAggregator;
pub use error::{ConversionError, Result};
pub use sse::SseFrame;
pub use transformer::{
    translate, AnthropicStreamTranslator, ControlGate, GateOutcome, OpenAiStreamTranslator,
    StreamTranslator,
};
