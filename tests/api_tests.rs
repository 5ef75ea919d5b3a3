//! HTTP API tests
//!
//! The full route table wired through `assemble`, backed by a temporary
//! SQLite database and a postback transport that accepts everything.

use std::sync::{Arc, Once};
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{App, test};
use async_trait::async_trait;
use clicktrail::api::services::configure;
use clicktrail::config::{StaticConfig, init_config};
use clicktrail::postback::{PostbackTransport, PreparedRequest, TransportResponse};
use clicktrail::runtime::lifetime::startup::{StartupContext, assemble};
use clicktrail::storage::SeaOrmStorage;
use serde_json::{Value, json};
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

/// 所有请求都返回 200
struct AcceptAllTransport;

#[async_trait]
impl PostbackTransport for AcceptAllTransport {
    async fn send(
        &self,
        _request: &PreparedRequest,
        _timeout: Duration,
    ) -> Result<TransportResponse, String> {
        Ok(TransportResponse {
            status: 200,
            body: "ok".to_string(),
        })
    }
}

async fn setup() -> (StartupContext, TempDir) {
    init_test_config();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let storage = Arc::new(
        SeaOrmStorage::new(&db_url, "sqlite")
            .await
            .expect("Failed to create storage"),
    );
    let mut config = StaticConfig::default();
    config.tracking.default_landing_url = "https://fallback.example/?cid={clickid}".to_string();
    let ctx = assemble(storage, Arc::new(AcceptAllTransport), &config);
    (ctx, dir)
}

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data($ctx.state.clone())
                .configure(|cfg| configure(cfg, "")),
        )
        .await
    };
    ($ctx:expr, $token:expr) => {
        test::init_service(
            App::new()
                .app_data($ctx.state.clone())
                .configure(|cfg| configure(cfg, $token)),
        )
        .await
    };
}

macro_rules! register_offer {
    ($app:expr, $offer:expr, $advertiser:expr, $landing:expr) => {{
        let landing: Option<&str> = $landing;
        let req = test::TestRequest::put()
            .uri(&format!("/offers/{}", $offer))
            .insert_header(("X-Owner-Id", $advertiser))
            .set_json(json!({"campaign_id": "camp1", "landing_url": landing}))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }};
}

fn location(resp: &actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>) -> String {
    resp.headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn click_id_from(location: &str) -> String {
    location
        .split("cid=")
        .nth(1)
        .unwrap_or_default()
        .split('&')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tracking_routes {
    use super::*;

    #[actix_rt::test]
    async fn test_click_redirects_and_is_queryable() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);
        register_offer!(app, "o1", "adv1", Some("https://lp.example/?cid={clickid}"));

        let req = test::TestRequest::get()
            .uri("/click?offer=o1&partner=p1&sub1=x&utm_source=fb")
            .insert_header(("User-Agent", "Mozilla/5.0"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let loc = location(&resp);
        assert!(loc.starts_with("https://lp.example/?cid="));
        let click_id = click_id_from(&loc);
        assert_eq!(click_id.len(), 12);

        let req = test::TestRequest::get()
            .uri(&format!("/click/{}", click_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["click"]["partner_id"], "p1");
        assert_eq!(body["data"]["click"]["subs"]["sub1"], "x");
        assert_eq!(body["data"]["events"][0]["type"], "open");
    }

    #[actix_rt::test]
    async fn test_click_without_partner_is_bad_request() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);
        register_offer!(app, "o1", "adv1", None);

        let req = test::TestRequest::get().uri("/click?offer=o1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_unknown_tracking_code_is_404() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);

        let req = test::TestRequest::get().uri("/Nope1234").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_tracking_link_flow() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);
        register_offer!(app, "o1", "adv1", None);

        let req = test::TestRequest::post()
            .uri("/affiliate/tracking-links")
            .insert_header(("X-Owner-Id", "p9"))
            .set_json(json!({"offer_id": "o1", "subs": {"sub1": "fromlink"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let code = body["data"]["code"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/{}", code))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        // offer 没有落地页，走兜底地址
        let loc = location(&resp);
        assert!(loc.starts_with("https://fallback.example/?cid="));

        let req = test::TestRequest::get()
            .uri(&format!("/click/{}", click_id_from(&loc)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["click"]["partner_id"], "p9");
        assert_eq!(body["data"]["click"]["subs"]["sub1"], "fromlink");
    }

    #[actix_rt::test]
    async fn test_post_event_statuses() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);
        register_offer!(app, "o1", "adv1", Some("https://lp.example/?cid={clickid}"));

        let req = test::TestRequest::get()
            .uri("/click?offer=o1&partner=p1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        let click_id = click_id_from(&location(&resp));

        let req = test::TestRequest::post()
            .uri("/event")
            .set_json(json!({"clickid": click_id, "type": "deposit", "revenue": "50.00", "currency": "USD"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["revenue"], 50.0);

        let req = test::TestRequest::post()
            .uri("/event")
            .set_json(json!({"clickid": click_id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"][0]["field"], "type");

        let req = test::TestRequest::post()
            .uri("/event")
            .set_json(json!({"clickid": "unknownclick", "type": "lead"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 3000);
    }

    #[actix_rt::test]
    async fn test_blacklisted_click_is_forbidden() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);
        register_offer!(app, "o1", "adv1", None);

        let req = test::TestRequest::post()
            .uri("/blacklist")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({"kind": "subid", "value": "badsource"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/click?offer=o1&partner=p1&sub3=badsource")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}

#[cfg(test)]
mod management_routes {
    use super::*;

    #[actix_rt::test]
    async fn test_missing_owner_is_unauthorized() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);

        let req = test::TestRequest::get()
            .uri("/postback/profiles")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 2001);
    }

    #[actix_rt::test]
    async fn test_bearer_token_is_checked() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx, "s3cret");

        let req = test::TestRequest::get()
            .uri("/postback/profiles")
            .insert_header(("X-Owner-Id", "adv1"))
            .insert_header(("Authorization", "Bearer wrong"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/postback/profiles")
            .insert_header(("X-Owner-Id", "adv1"))
            .insert_header(("Authorization", "Bearer s3cret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_rt::test]
    async fn test_profile_crud_is_owner_scoped() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);

        let req = test::TestRequest::post()
            .uri("/postback/profiles")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({
                "name": "Keitaro",
                "endpoint_url": "https://tracker.example/postback",
                "scope_type": "offer",
                "scope_id": "o1",
                "status_map": {"deposit": "sale"},
                "params_template": {"subid": "{{clickid}}", "status": "{{status}}"}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["scope_type"], "offer");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/postback/profiles/{}", id))
            .insert_header(("X-Owner-Id", "adv2"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::put()
            .uri(&format!("/postback/profiles/{}", id))
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({"enabled": false}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["enabled"], false);
        assert_eq!(body["data"]["name"], "Keitaro");

        let req = test::TestRequest::post()
            .uri(&format!("/postback/profiles/{}/test", id))
            .insert_header(("X-Owner-Id", "adv1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["sent"], false);

        let req = test::TestRequest::delete()
            .uri(&format!("/postback/profiles/{}", id))
            .insert_header(("X-Owner-Id", "adv1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/postback/profiles")
            .insert_header(("X-Owner-Id", "adv1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    }

    #[actix_rt::test]
    async fn test_affiliate_profile_is_forced_global() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);

        let req = test::TestRequest::post()
            .uri("/affiliate/postback/profiles")
            .insert_header(("X-Owner-Id", "p1"))
            .set_json(json!({
                "name": "My tracker",
                "endpoint_url": "https://mine.example/pb",
                "scope_type": "offer",
                "scope_id": "o1"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["scope_type"], "global");
        assert_eq!(body["data"]["scope_id"], Value::Null);
    }

    #[actix_rt::test]
    async fn test_postback_test_is_dry_run() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);

        let req = test::TestRequest::post()
            .uri("/postback/test")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({
                "tracker_url": "https://tracker.example/pb",
                "params_template": {"cid": "{{clickid}}", "status": "{{status}}"},
                "status_map": {"lead": "approved"},
                "test_data": {"clickid": "testclick01", "event_type": "lead"}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["sent"], false);
        assert_eq!(
            body["data"]["request"]["url"],
            "https://tracker.example/pb?cid=testclick01&status=approved"
        );

        let req = test::TestRequest::post()
            .uri("/postback/test")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_manual_send_and_deliveries() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);
        register_offer!(app, "o1", "adv1", Some("https://lp.example/?cid={clickid}"));

        let req = test::TestRequest::get()
            .uri("/click?offer=o1&partner=p1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        let click_id = click_id_from(&location(&resp));

        let req = test::TestRequest::post()
            .uri("/postback/profiles")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({
                "name": "Tracker",
                "endpoint_url": "https://tracker.example/pb",
                "params_template": {"cid": "{{clickid}}"}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/postback/send")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({"clickid": click_id, "event_type": "sale", "revenue": 12.5}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["delivered"], 1);
        assert_eq!(body["data"]["event_type"], "sale");

        let req = test::TestRequest::get()
            .uri(&format!("/postback/deliveries?clickid={}&limit=10", click_id))
            .insert_header(("X-Owner-Id", "adv1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let rows = body["data"].as_array().cloned().unwrap_or_default();
        assert!(rows.iter().any(|r| r["event_type"] == "sale"));

        // 不属于自己的点击
        let req = test::TestRequest::post()
            .uri("/postback/send")
            .insert_header(("X-Owner-Id", "stranger"))
            .set_json(json!({"clickid": click_id, "event_type": "sale"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_blacklist_routes() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);

        let req = test::TestRequest::post()
            .uri("/blacklist")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({"kind": "ip", "value": "not-an-ip"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/blacklist")
            .insert_header(("X-Owner-Id", "adv1"))
            .set_json(json!({"kind": "ip", "value": "10.0.0.0/8"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/blacklist")
            .insert_header(("X-Owner-Id", "adv1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

        for expected in [StatusCode::OK, StatusCode::NOT_FOUND] {
            let req = test::TestRequest::delete()
                .uri(&format!("/blacklist/{}", id))
                .insert_header(("X-Owner-Id", "adv1"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected);
        }
    }
}

#[cfg(test)]
mod health_routes {
    use super::*;

    #[actix_rt::test]
    async fn test_liveness_and_readiness() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);

        let req = test::TestRequest::get().uri("/health/live").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/health/ready").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["database"], "healthy");
        assert_eq!(body["data"]["accepting"], true);
    }

    #[actix_rt::test]
    async fn test_readiness_fails_after_drain() {
        let (ctx, _dir) = setup().await;
        let app = app!(ctx);
        ctx.dispatch.drain().await;

        let req = test::TestRequest::get().uri("/health/ready").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
