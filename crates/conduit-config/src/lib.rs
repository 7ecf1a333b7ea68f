pub mod config;
pub mod manager;

pub use config::{
    default_backend_args, BackendConfig, Config, ConfigError, ConfigResult, LogLevel,
    LoggingConfig, ServerConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Conduit 配置目录路径
pub fn conduit_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".conduit"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    conduit_dir().map(|dir| dir.join("config.json"))
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conduit_dir() {
        let dir = conduit_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().to_string_lossy().contains(".conduit"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/.conduit/config.json").unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_tilde("/etc/conduit.json").unwrap(), PathBuf::from("/etc/conduit.json"));
    }
}
