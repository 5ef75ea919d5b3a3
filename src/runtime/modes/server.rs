//! Server mode
//!
//! 启动 HTTP 服务，Ctrl+C 后先停 HTTP，再排空回传队列。

use actix_web::{
    App, HttpServer,
    middleware::DefaultHeaders,
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::middleware::RequestIdMiddleware;
use crate::api::services::configure;
use crate::runtime::lifetime;

/// JSON 请求体上限
const JSON_LIMIT: usize = 256 * 1024;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let startup = lifetime::startup::prepare_server_startup()
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let config = crate::config::get_config();
    let state = startup.state.clone();
    let token = config.api.token.clone();
    if token.is_empty() {
        warn!("api.token is empty: management routes only require X-Owner-Id");
    }

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        let token = token.clone();
        App::new()
            .wrap(RequestIdMiddleware)
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(JSON_LIMIT))
            .wrap(
                DefaultHeaders::new()
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate")),
            )
            .configure(move |cfg| configure(cfg, &token))
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count)
    // 信号由我们处理，保证先停 HTTP 再排空队列
    .disable_signals()
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    warn!("Starting server at http://{}", bind_address);
    let server_handle = server.handle();

    let result = tokio::select! {
        res = server => res.context("HTTP server stopped with error"),
        _ = lifetime::shutdown::listen_for_shutdown() => {
            server_handle.stop(true).await;
            Ok(())
        }
    };

    startup.dispatch.drain().await;
    warn!("Graceful shutdown: all tasks completed");
    result
}
