//! 结构化日志模块
//!
//! 基于 tracing 的结构化日志，日志级别可在运行时重新加载。

use std::sync::Arc;

use conduit_config::LoggingConfig;
use parking_lot::RwLock;
use tracing_subscriber::{
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::error::{ObservabilityError, Result};

/// 日志级别重新加载句柄类型
type ReloadHandle = Handle<EnvFilter, Registry>;

/// 日志管理器
#[derive(Debug, Clone)]
pub struct LogManager {
    config: Arc<RwLock<LoggingConfig>>,
    reload_handle: Arc<ReloadHandle>,
}

impl LogManager {
    /// 安装全局 subscriber
    ///
    /// 设置了 `RUST_LOG` 时优先于配置中的级别。
    /// 已安装全局 subscriber 时返回错误。
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let filter = match std::env::var("RUST_LOG") {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
                .map_err(|e| ObservabilityError::logging(format!("Invalid RUST_LOG: {}", e)))?,
            _ => build_filter(config)?,
        };
        let (filter, reload_handle) = reload::Layer::new(filter);

        let registry = tracing_subscriber::registry().with(filter);
        let installed = if config.json {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_line_number(true);
            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true);
            registry.with(layer).try_init()
        };
        installed.map_err(|e| ObservabilityError::init(e.to_string()))?;

        tracing::info!(
            target: "conduit_observability",
            level = config.level.as_str(),
            json = config.json,
            "Log manager initialized"
        );

        Ok(Self {
            config: Arc::new(RwLock::new(config.clone())),
            reload_handle: Arc::new(reload_handle),
        })
    }

    /// 动态更新日志配置
    pub fn apply(&self, config: &LoggingConfig) -> Result<()> {
        if *self.config.read() == *config {
            return Ok(());
        }

        let new_filter = build_filter(config)?;
        self.reload_handle
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;

        if self.config.read().json != config.json {
            tracing::warn!(
                target: "conduit_observability",
                "Changing the log format requires a restart"
            );
        }
        *self.config.write() = config.clone();

        tracing::info!(
            target: "conduit_observability",
            "Log level updated to: {}",
            config.level.as_str()
        );
        Ok(())
    }

    /// 获取当前配置
    pub fn config(&self) -> LoggingConfig {
        self.config.read().clone()
    }
}

/// 构建环境过滤器
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(config.level.as_str())
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

    for (module, level) in &config.module_levels {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
        );
    }

    Ok(filter)
}

/// 创建单个网关请求的 span
pub fn create_request_span(request_id: &str, api: &'static str) -> tracing::Span {
    tracing::info_span!(
        "request",
        request_id = %request_id,
        api = api,
    )
}
