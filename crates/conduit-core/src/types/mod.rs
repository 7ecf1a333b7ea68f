pub mod content;
pub mod stop_reason;
pub mod usage;

pub use content::{BlockDelta, ContentBlock};
pub use stop_reason::{map_finish_reason, FinishReason, StopReason};
pub use usage::Usage;
