//! HTTP Server - 路由与生命周期

use std::future::Future;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{anthropic, openai, system};
use crate::state::AppState;

/// 创建路由
pub fn create_router(state: AppState) -> Router {
    let cors = state.server.cors;

    let router = Router::new()
        // OpenAI 兼容
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/v1/models", get(system::models))
        // Anthropic 兼容
        .route("/v1/messages", post(anthropic::messages))
        // 运维
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .layer(TraceLayer::new_for_http());

    let router = if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };
    router.with_state(state)
}

/// 运行 HTTP 服务器，`shutdown` 完成后关闭后端进程并停止接受连接
pub async fn run_server<F>(state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind((state.server.host.as_str(), state.server.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", state.server.host, state.server.port))?;
    let addr = listener.local_addr()?;

    let manager = state.manager.clone();
    let app = create_router(state);

    tracing::info!("Conduit listening on http://{}", addr);

    // 先关闭后端进程，未结束的流才能收尾
    let signal = async move {
        shutdown.await;
        tracing::info!("Shutdown signal received, stopping backend");
        manager.shutdown();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
