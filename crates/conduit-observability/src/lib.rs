//! Conduit 可观测性基础设施
//!
//! 提供统一的日志、指标和健康检查功能。

#![warn(missing_docs)]

pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;

pub use error::{ObservabilityError, Result};
pub use health::{run_checks, HealthCheck, HealthCheckResult, HealthResponse, HealthStatus};
pub use logging::{create_request_span, LogManager};
pub use metrics::{BackendMetrics, HttpMetrics, MetricsCollector};

use std::sync::Arc;

use conduit_config::LoggingConfig;

/// 统一的观测性句柄
#[derive(Debug, Clone)]
pub struct Observability {
    log_manager: LogManager,
    metrics: Arc<MetricsCollector>,
}

impl Observability {
    /// 初始化日志与指标
    ///
    /// `metrics` 为 false 时收集器渲染空页面，所有记录调用都是空操作。
    pub fn init(logging: &LoggingConfig, metrics: bool) -> Result<Self> {
        let log_manager = LogManager::init(logging)?;
        let metrics = if metrics {
            MetricsCollector::install()?
        } else {
            MetricsCollector::disabled()
        };

        tracing::info!(
            target: "conduit_observability",
            "Observability infrastructure initialized"
        );

        Ok(Self {
            log_manager,
            metrics: Arc::new(metrics),
        })
    }

    /// 获取日志管理器
    pub fn log_manager(&self) -> &LogManager {
        &self.log_manager
    }

    /// 获取指标收集器
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }
}
