//! 健康检查模块
//!
//! 健康检查类型与聚合逻辑；路由由服务端挂载到 `/health`。

use std::time::Instant;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 健康
    Healthy,
    /// 不健康
    Unhealthy,
    /// 降级
    Degraded,
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus::Healthy
    }
}

impl HealthStatus {
    /// 转换为 HTTP 状态码
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// 检查是否健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// 健康检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// 检查名称
    pub name: String,
    /// 状态
    pub status: HealthStatus,
    /// 消息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 响应时间（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// 额外元数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl HealthCheckResult {
    /// 创建检查结果
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            message: None,
            response_time_ms: None,
            metadata: None,
        }
    }

    /// 附加消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 附加元数据
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// 整体健康响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 整体状态
    pub status: HealthStatus,
    /// 应用名称
    pub app_name: String,
    /// 版本
    pub version: String,
    /// 运行时间（秒）
    pub uptime_seconds: u64,
    /// 时间戳
    pub timestamp: String,
    /// 各检查项结果
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheckResult>,
}

/// 健康检查 trait
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    /// 执行检查
    async fn check(&self) -> HealthCheckResult;

    /// 获取检查名称
    fn name(&self) -> &str;
}

/// 依次运行检查并汇总整体状态
pub async fn run_checks(
    app_name: &str,
    started_at: Instant,
    checks: &[Box<dyn HealthCheck>],
) -> HealthResponse {
    let mut results = Vec::with_capacity(checks.len());
    let mut overall = HealthStatus::Healthy;

    for check in checks {
        let check_start = Instant::now();
        let mut result = check.check().await;
        result.response_time_ms = Some(check_start.elapsed().as_millis() as u64);

        match result.status {
            HealthStatus::Unhealthy => overall = HealthStatus::Unhealthy,
            HealthStatus::Degraded if overall == HealthStatus::Healthy => {
                overall = HealthStatus::Degraded;
            }
            _ => {}
        }
        results.push(result);
    }

    HealthResponse {
        status: overall,
        app_name: app_name.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: results,
    }
}
