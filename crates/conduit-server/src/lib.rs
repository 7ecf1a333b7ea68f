pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::{Api, ApiError};
pub use server::{create_router, run_server};
pub use state::{AppState, BackendHealthCheck};
