//! 健康检查 `/health`

use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use tracing::{error, trace};

use crate::api::AppState;

use super::error_code::ErrorCode;
use super::helpers::json_response;
use super::types::HealthResponse;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// 存活检查，只返回 200
pub async fn liveness_check() -> impl Responder {
    trace!("Received liveness check request");
    HttpResponse::Ok()
        .append_header(("Content-Type", "text/plain; charset=utf-8"))
        .body("OK")
}

/// 就绪检查：数据库 ping + 分发队列状态
pub async fn readiness_check(state: web::Data<AppState>) -> impl Responder {
    trace!("Received readiness check request");

    let (database, error) = match tokio::time::timeout(PING_TIMEOUT, state.health.ping()).await {
        Ok(Ok(())) => ("healthy".to_string(), None),
        Ok(Err(e)) => {
            error!("Database health check failed: {}", e);
            ("unhealthy".to_string(), Some(format!("database error: {}", e)))
        }
        Err(_) => {
            error!("Database health check timeout");
            ("unhealthy".to_string(), Some("timeout".to_string()))
        }
    };

    let accepting = state.queue.is_accepting();
    let is_healthy = error.is_none() && accepting;
    let now = chrono::Utc::now();

    let data = HealthResponse {
        status: if is_healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: now.to_rfc3339(),
        uptime: (now - state.started_at).num_seconds().max(0) as u64,
        database,
        queue_depth: state.queue.depth(),
        accepting,
        error,
    };

    if is_healthy {
        json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
    } else {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ServiceUnavailable,
            "Service Unavailable",
            Some(data),
        )
    }
}
