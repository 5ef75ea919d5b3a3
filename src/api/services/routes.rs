//! 路由配置
//!
//! 注册顺序有意义：`/{code}` 会匹配任意单段路径，必须最后注册。

use actix_web::web;

use crate::api::middleware::CallerAuth;
use crate::postback::CallerRole;

use super::{blacklist, health, postback, tracking};

/// 回传 profile / 投递日志路由，advertiser 与 partner 共用
///
/// - POST /send - 手动补发
/// - POST /test - 临时 profile dry-run
/// - GET/POST /profiles
/// - GET/PUT/DELETE /profiles/{id}
/// - POST /profiles/{id}/test - 已保存 profile 的 dry-run
/// - GET /deliveries - 最近的投递记录
fn postback_scope(path: &str) -> actix_web::Scope {
    web::scope(path)
        .route("/send", web::post().to(postback::send_postback))
        .route("/test", web::post().to(postback::test_postback))
        .route("/profiles", web::get().to(postback::list_profiles))
        .route("/profiles", web::post().to(postback::create_profile))
        .route("/profiles/{id}/test", web::post().to(postback::test_profile))
        .route("/profiles/{id}", web::get().to(postback::get_profile))
        .route("/profiles/{id}", web::put().to(postback::update_profile))
        .route("/profiles/{id}", web::delete().to(postback::delete_profile))
        .route("/deliveries", web::get().to(postback::list_deliveries))
}

/// 健康检查路由 `/health`
pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("/live", web::get().to(health::liveness_check))
        .route("/live", web::head().to(health::liveness_check))
        .route("/ready", web::get().to(health::readiness_check))
        .route("/ready", web::head().to(health::readiness_check))
}

/// advertiser 管理路由 `/postback`
pub fn advertiser_postback_routes() -> actix_web::Scope {
    postback_scope("/postback")
}

/// partner 管理路由 `/affiliate`
///
/// profile 写入时作用域被强制为 global。
pub fn affiliate_routes() -> actix_web::Scope {
    web::scope("/affiliate")
        .route(
            "/tracking-links",
            web::post().to(tracking::post_tracking_link),
        )
        .service(postback_scope("/postback"))
}

/// 黑名单管理路由 `/blacklist`
pub fn blacklist_routes() -> actix_web::Scope {
    web::scope("/blacklist")
        .route("", web::get().to(blacklist::list_entries))
        .route("", web::post().to(blacklist::add_entry))
        .route("/{id}", web::delete().to(blacklist::delete_entry))
}

/// offer 注册路由 `/offers`
pub fn offer_routes() -> actix_web::Scope {
    web::scope("/offers").route("/{id}", web::put().to(tracking::put_offer))
}

/// 注册全部路由，管理路由在这里套上 `CallerAuth`
pub fn configure(cfg: &mut web::ServiceConfig, token: &str) {
    cfg.service(health_routes())
        .service(
            advertiser_postback_routes()
                .wrap(CallerAuth::new(CallerRole::Advertiser, token)),
        )
        .service(affiliate_routes().wrap(CallerAuth::new(CallerRole::Partner, token)))
        .service(blacklist_routes().wrap(CallerAuth::new(CallerRole::Advertiser, token)))
        .service(offer_routes().wrap(CallerAuth::new(CallerRole::Advertiser, token)))
        .route("/click", web::get().to(tracking::click))
        .route("/click/{clickid}", web::get().to(tracking::get_click))
        .route("/event", web::post().to(tracking::post_event))
        .route("/{code}", web::get().to(tracking::tracking_link));
}
