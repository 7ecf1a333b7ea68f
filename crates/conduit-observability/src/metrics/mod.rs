//! 指标收集模块
//!
//! 提供基于 metrics 库的指标收集功能。未安装 recorder 时所有记录调用都是空操作。

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

#[cfg(feature = "prometheus")]
use crate::error::ObservabilityError;
use crate::error::Result;

/// 指标收集器
pub struct MetricsCollector {
    #[cfg(feature = "prometheus")]
    handle: Option<PrometheusHandle>,
    installed: bool,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("installed", &self.installed)
            .finish()
    }
}

impl MetricsCollector {
    /// 安装全局 Prometheus recorder
    pub fn install() -> Result<Self> {
        #[cfg(feature = "prometheus")]
        let handle = {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder).map_err(|e| {
                ObservabilityError::metrics(format!("Failed to set global recorder: {}", e))
            })?;
            Some(handle)
        };
        register_descriptions();

        tracing::info!(
            target: "conduit_observability",
            "Metrics collector initialized"
        );

        Ok(Self {
            #[cfg(feature = "prometheus")]
            handle,
            installed: true,
        })
    }

    /// 不记录任何指标的收集器，渲染结果为空
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "prometheus")]
            handle: None,
            installed: false,
        }
    }

    /// 是否已安装全局 recorder
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// 获取 Prometheus 格式的指标
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.handle
                .as_ref()
                .map(|h| h.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// 注册指标描述
fn register_descriptions() {
    describe_counter!(
        "conduit_http_requests_total",
        Unit::Count,
        "Total number of gateway requests by api and mode"
    );
    describe_counter!(
        "conduit_http_errors_total",
        Unit::Count,
        "Requests that ended with a backend error"
    );
    describe_histogram!(
        "conduit_request_duration_seconds",
        Unit::Seconds,
        "Time from enqueue to completion of a backend request"
    );
    describe_counter!(
        "conduit_backend_spawns_total",
        Unit::Count,
        "Number of backend processes started"
    );
    describe_counter!(
        "conduit_backend_exits_total",
        Unit::Count,
        "Number of backend process exits"
    );
    describe_counter!(
        "conduit_backend_malformed_lines_total",
        Unit::Count,
        "Backend output lines that failed to parse"
    );
    describe_gauge!(
        "conduit_backend_queue_length",
        Unit::Count,
        "Requests waiting for the backend"
    );
    describe_counter!(
        "conduit_tokens_input_total",
        Unit::Count,
        "Input tokens reported by the backend"
    );
    describe_counter!(
        "conduit_tokens_output_total",
        Unit::Count,
        "Output tokens reported by the backend"
    );
}

/// HTTP 请求指标记录器
pub struct HttpMetrics;

impl HttpMetrics {
    /// 记录 HTTP 请求
    pub fn record_request(api: &'static str, stream: bool) {
        metrics::counter!(
            "conduit_http_requests_total",
            "api" => api,
            "mode" => if stream { "stream" } else { "blocking" }
        )
        .increment(1);
    }

    /// 记录以错误结束的请求
    pub fn record_error(api: &'static str, kind: &'static str) {
        metrics::counter!("conduit_http_errors_total", "api" => api, "kind" => kind).increment(1);
    }
}

/// 后端进程与队列指标记录器
pub struct BackendMetrics;

impl BackendMetrics {
    /// 记录进程启动
    pub fn record_spawn() {
        metrics::counter!("conduit_backend_spawns_total").increment(1);
    }

    /// 记录进程退出
    pub fn record_exit(code: Option<i32>) {
        let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        metrics::counter!("conduit_backend_exits_total", "code" => code).increment(1);
    }

    /// 记录无法解析的输出行
    pub fn record_malformed_line() {
        metrics::counter!("conduit_backend_malformed_lines_total").increment(1);
    }

    /// 设置等待队列长度
    pub fn set_queue_length(len: usize) {
        metrics::gauge!("conduit_backend_queue_length").set(len as f64);
    }

    /// 记录请求耗时
    pub fn record_duration(outcome: &'static str, duration_secs: f64) {
        metrics::histogram!("conduit_request_duration_seconds", "outcome" => outcome)
            .record(duration_secs);
    }

    /// 记录 Token 消耗
    pub fn record_tokens(input_tokens: u64, output_tokens: u64) {
        metrics::counter!("conduit_tokens_input_total").increment(input_tokens);
        metrics::counter!("conduit_tokens_output_total").increment(output_tokens);
    }
}
