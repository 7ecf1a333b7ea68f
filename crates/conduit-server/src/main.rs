use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use conduit_config::{ConfigManager, LogLevel};
use conduit_observability::Observability;
use conduit_server::{run_server, AppState};

#[derive(Parser, Debug, Clone)]
#[command(name = "conduit-server")]
#[command(about = "OpenAI and Anthropic compatible gateway over a persistent backend process")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "CONDUIT_CONFIG", default_value = "~/.conduit/config.json")]
    config: String,

    /// Listen host (overrides config)
    #[arg(long, env = "CONDUIT_HOST")]
    host: Option<String>,

    /// Listen port (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Backend executable (overrides config)
    #[arg(long, env = "CONDUIT_BACKEND")]
    backend: Option<String>,

    /// Backend working directory (overrides config)
    #[arg(long, env = "CONDUIT_WORKING_DIR")]
    working_dir: Option<String>,

    /// Fail a request when the backend is silent this long (overrides config)
    #[arg(long, env = "CONDUIT_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Log level (overrides config)
    #[arg(long, env = "CONDUIT_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    /// Emit JSON logs
    #[arg(long, default_value = "false")]
    json_logs: bool,

    /// Disable the Prometheus recorder
    #[arg(long, default_value = "false")]
    no_metrics: bool,

    /// Disable hot-reload
    #[arg(long, default_value = "false")]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path =
        conduit_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    let config_manager = ConfigManager::load(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // command line values win over the config file
    config_manager
        .update(|config| {
            if let Some(host) = &cli.host {
                config.server.host = host.clone();
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(program) = &cli.backend {
                config.backend.program = program.clone();
            }
            if let Some(dir) = &cli.working_dir {
                config.backend.working_dir = Some(dir.clone());
            }
            if let Some(secs) = cli.request_timeout {
                config.backend.request_timeout_secs = Some(secs);
            }
            if let Some(level) = cli.log_level {
                config.logging.level = level;
            }
            if cli.json_logs {
                config.logging.json = true;
            }
        })
        .await
        .context("Invalid command line overrides")?;

    let config = config_manager.snapshot().await;

    let observability = Observability::init(&config.logging, !cli.no_metrics)
        .context("Failed to initialize logging")?;
    tracing::info!("Config loaded from {:?}", config_path);

    #[cfg(feature = "hot-reload")]
    let _watcher = if cli.no_watch {
        None
    } else {
        let mut watcher = config_manager.clone();
        let log_manager = observability.log_manager().clone();
        let result = watcher.watch(move |config| {
            if let Err(e) = log_manager.apply(&config.logging) {
                tracing::warn!("Failed to apply reloaded logging config: {}", e);
            }
            tracing::info!("Backend and server settings take effect on restart");
        });
        match result {
            Ok(()) => Some(watcher),
            Err(e) => {
                tracing::warn!("Failed to start config watcher: {}", e);
                None
            }
        }
    };

    tracing::info!("Backend: {} {}", config.backend.program, config.backend.args.join(" "));
    match config.backend.credential_source() {
        Some(var) => tracing::info!("Backend credential found in {}", var),
        None if config.backend.require_credential => tracing::warn!(
            "No backend credential set; requests will fail until one of {} is exported",
            config.backend.credential_env.join(", ")
        ),
        None => tracing::info!("No credential variable set; relying on the backend's own login"),
    }

    let state = AppState::new(&config, observability.metrics());

    run_server(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
