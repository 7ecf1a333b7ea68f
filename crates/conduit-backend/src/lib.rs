//! Persistent backend process management.
//!
//! [`ProcessManager`] owns a single long-lived backend child process that
//! speaks line-delimited JSON on stdin/stdout. Prompts are serialized onto it
//! one at a time; each caller gets a [`RequestHandle`] that yields the
//! request's [`Delivery`] values.

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod manager;
mod process;

pub use dispatch::parse_line;
pub use error::{BackendError, Result};
pub use manager::{Completed, Delivery, ManagerStatus, ProcessManager, RequestHandle};
