use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 配置管理器
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
    #[cfg(feature = "hot-reload")]
    watcher: Option<Arc<std::sync::Mutex<notify::RecommendedWatcher>>>,
}

impl ConfigManager {
    /// 加载配置文件，不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            Self::read_file(path).await?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self::new(config, path.to_path_buf()))
    }

    /// 从默认位置加载配置
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    /// 获取默认配置路径 (~/.conduit/config.json)
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
            #[cfg(feature = "hot-reload")]
            watcher: None,
        }
    }

    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// 获取当前配置副本
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 保存配置到文件
    pub async fn save(&self) -> ConfigResult<()> {
        let config = self.config.read().await;
        let content = serde_json::to_string_pretty(&*config)?;
        drop(config);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload(&self) -> ConfigResult<()> {
        if !self.path.exists() {
            return Err(ConfigError::InvalidPath(format!(
                "Config file not found: {:?}",
                self.path
            )));
        }

        let new_config = Self::read_file(&self.path).await?;
        *self.config.write().await = new_config;

        info!("Config reloaded from {:?}", self.path);
        Ok(())
    }

    /// 在内存中修改配置，不写回文件
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut candidate = self.snapshot().await;
        f(&mut candidate);
        Self::validate(&candidate)?;
        *self.config.write().await = candidate;
        Ok(())
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        if config.server.default_model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.default_model cannot be empty".to_string(),
            ));
        }

        if config.backend.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "backend.program cannot be empty".to_string(),
            ));
        }

        if config.backend.max_line_bytes == 0 {
            return Err(ConfigError::Validation(
                "backend.max_line_bytes must be greater than 0".to_string(),
            ));
        }

        if config.backend.request_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "backend.request_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        if config.backend.require_credential && config.backend.credential_env.is_empty() {
            return Err(ConfigError::Validation(
                "backend.credential_env cannot be empty when require_credential is set"
                    .to_string(),
            ));
        }

        Ok(())
    }

    async fn read_file(path: &Path) -> ConfigResult<Config> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::expand_env_vars(&content)?;
        let config: Config = serde_json::from_str(&content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let (var_name, default_value) = match var_expr.find(":-") {
                Some(pos) => (&var_expr[..pos], Some(&var_expr[pos + 2..])),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "hot-reload")]
impl ConfigManager {
    /// 启动热重载监听
    ///
    /// 每次成功重载后在 tokio 运行时上调用 `callback`。
    /// 无效的修改只记录日志，继续使用之前的配置。
    pub fn watch<F>(&mut self, callback: F) -> ConfigResult<()>
    where
        F: Fn(&Config) + Send + Sync + 'static,
    {
        use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    if event.kind.is_modify() {
                        let _ = tx.send(());
                    }
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| ConfigError::Validation(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.path, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::Validation(format!("Failed to watch config: {}", e)))?;
        self.watcher = Some(Arc::new(std::sync::Mutex::new(watcher)));

        let manager = self.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // 编辑器保存一次可能触发多个修改事件
                while rx.try_recv().is_ok() {}
                debug!("Config file changed, reloading...");

                match manager.reload().await {
                    Ok(()) => {
                        info!("Config hot-reloaded successfully");
                        let config = manager.snapshot().await;
                        callback(&config);
                    }
                    Err(e) => warn!("Failed to hot-reload config: {}", e),
                }
            }
        });

        info!("Started watching config file: {:?}", self.path);
        Ok(())
    }

    /// 停止热重载监听
    pub fn unwatch(&mut self) -> ConfigResult<()> {
        use notify::Watcher;

        if let Some(watcher) = self.watcher.take() {
            if let Ok(mut w) = watcher.lock() {
                w.unwatch(&self.path).map_err(|e| {
                    ConfigError::Validation(format!("Failed to unwatch config: {}", e))
                })?;
            }
            info!("Stopped watching config file");
        }
        Ok(())
    }
}
