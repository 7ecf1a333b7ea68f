use thiserror::Error;

/// Why a request could not be completed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("failed to spawn backend '{program}': {message}")]
    SpawnFailure { program: String, message: String },

    #[error("backend process {}", describe_exit(.code))]
    ExitFailure { code: Option<i32> },

    #[error("no backend credential found; set one of: {}", .searched.join(", "))]
    AuthenticationMissing { searched: Vec<String> },

    #[error("backend produced no output for {seconds}s")]
    Timeout { seconds: u64 },

    #[error("backend I/O error: {0}")]
    Io(String),

    #[error("process manager has been shut down")]
    ShutDown,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

impl BackendError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpawnFailure { .. } => "spawn_failure",
            Self::ExitFailure { .. } => "exit_failure",
            Self::AuthenticationMissing { .. } => "authentication_missing",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
            Self::ShutDown => "shut_down",
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
