use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use conduit_backend::ProcessManager;
use conduit_config::{Config, ServerConfig};
use conduit_observability::{HealthCheck, HealthCheckResult, HealthStatus, MetricsCollector};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: ProcessManager,
    pub server: Arc<ServerConfig>,
    pub metrics: Arc<MetricsCollector>,
    pub started_at: Instant,
    health_checks: Arc<Vec<Box<dyn HealthCheck>>>,
}

impl AppState {
    pub fn new(config: &Config, metrics: Arc<MetricsCollector>) -> Self {
        let manager = ProcessManager::new(config.backend.clone());
        let health_checks: Vec<Box<dyn HealthCheck>> =
            vec![Box::new(BackendHealthCheck::new(manager.clone()))];

        Self {
            manager,
            server: Arc::new(config.server.clone()),
            metrics,
            started_at: Instant::now(),
            health_checks: Arc::new(health_checks),
        }
    }

    /// Model echoed in responses: the client's choice, else the configured default.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        match requested {
            Some(model) if !model.trim().is_empty() => model.to_string(),
            _ => self.server.default_model.clone(),
        }
    }

    pub fn health_checks(&self) -> &[Box<dyn HealthCheck>] {
        &self.health_checks
    }
}

/// Reports the backend session and whether a credential is available to spawn it.
pub struct BackendHealthCheck {
    manager: ProcessManager,
}

impl BackendHealthCheck {
    pub fn new(manager: ProcessManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl HealthCheck for BackendHealthCheck {
    async fn check(&self) -> HealthCheckResult {
        let status = self.manager.status();
        let config = self.manager.config();

        let result = if config.require_credential && config.credential_source().is_none() {
            HealthCheckResult::new(self.name(), HealthStatus::Unhealthy).with_message(format!(
                "no backend credential found in {}",
                config.credential_env.join(", ")
            ))
        } else if status.alive {
            HealthCheckResult::new(self.name(), HealthStatus::Healthy)
                .with_message("backend process running")
        } else {
            HealthCheckResult::new(self.name(), HealthStatus::Healthy)
                .with_message("backend idle, spawns on next request")
        };

        result.with_metadata(serde_json::to_value(&status).unwrap_or_default())
    }

    fn name(&self) -> &str {
        "backend"
    }
}
