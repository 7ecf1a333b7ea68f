use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors: bool,
    /// Model ids advertised on `/v1/models`
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Model echoed back when a request omits one
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_models() -> Vec<String> {
    vec![
        "claude-sonnet-4-5".to_string(),
        "claude-opus-4-1".to_string(),
        "claude-haiku-4-5".to_string(),
    ]
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            cors: true,
            models: default_models(),
            default_model: default_model(),
        }
    }
}

/// How to launch and supervise the backend process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Executable to spawn
    pub program: String,
    /// Protocol flags passed on every spawn
    #[serde(default = "default_backend_args")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Extra environment for the child
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Any one of these variables being set satisfies the credential check
    #[serde(default = "default_credential_env")]
    pub credential_env: Vec<String>,
    /// Fail requests up front when none of `credential_env` is set.
    /// Off by default: the backend may be logged in through its own credential store.
    #[serde(default)]
    pub require_credential: bool,
    /// Lines longer than this are dropped as malformed
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Fail the active request when the backend is silent this long
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

pub fn default_backend_args() -> Vec<String> {
    [
        "--print",
        "--input-format",
        "stream-json",
        "--output-format",
        "stream-json",
        "--verbose",
        "--include-partial-messages",
        "--dangerously-skip-permissions",
        "--no-session-persistence",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_credential_env() -> Vec<String> {
    vec![
        "CLAUDE_CODE_OAUTH_TOKEN".to_string(),
        "ANTHROPIC_API_KEY".to_string(),
    ]
}

fn default_max_line_bytes() -> usize {
    8 * 1024 * 1024
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: default_backend_args(),
            working_dir: None,
            env: HashMap::new(),
            credential_env: default_credential_env(),
            require_credential: false,
            max_line_bytes: default_max_line_bytes(),
            request_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    /// Name of the first configured credential variable that is set and non-empty.
    ///
    /// Variables from [`BackendConfig::env`] count as well as the process environment.
    pub fn credential_source(&self) -> Option<&str> {
        self.credential_env
            .iter()
            .find(|name| {
                self.env.get(name.as_str()).map_or(false, |v| !v.is_empty())
                    || std::env::var(name.as_str()).map_or(false, |v| !v.is_empty())
            })
            .map(|s| s.as_str())
    }
}

/// Log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Per-module overrides, e.g. `{"conduit_backend": "debug"}`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub module_levels: HashMap<String, String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
