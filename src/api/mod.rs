//! HTTP 接口
//!
//! - 追踪路由（公开）：`/click`、`/event`、`/click/{id}`、`/{code}`
//! - 管理路由（需调用方身份）：`/postback/*`、`/affiliate/*`、`/blacklist*`、`/offers/*`
//! - 健康检查：`/health/*`

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::TrackingConfig;
use crate::postback::{DispatchQueue, Dispatcher};
use crate::services::{BlacklistFilter, ProfileService};
use crate::storage::traits::{DeliveryLog, HealthCheck};
use crate::tracking::TrackingService;

pub mod middleware;
pub mod services;

/// 从访客请求中提取客户端信息所需的配置
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub trusted_proxies: Vec<String>,
    pub country_header: String,
}

impl From<&TrackingConfig> for ClientSettings {
    fn from(cfg: &TrackingConfig) -> Self {
        Self {
            trusted_proxies: cfg.trusted_proxies.clone(),
            country_header: cfg.country_header.clone(),
        }
    }
}

/// 所有 handler 共享的状态，以 `web::Data<AppState>` 注入
pub struct AppState {
    pub tracking: Arc<TrackingService>,
    pub profiles: Arc<ProfileService>,
    pub dispatcher: Arc<Dispatcher>,
    pub queue: Arc<DispatchQueue>,
    pub blacklist: Arc<BlacklistFilter>,
    pub deliveries: Arc<dyn DeliveryLog>,
    pub health: Arc<dyn HealthCheck>,
    pub client: ClientSettings,
    pub started_at: DateTime<Utc>,
}
