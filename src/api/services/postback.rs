//! 回传管理路由
//!
//! 同一组 handler 同时挂在 `/postback`（advertiser）和 `/affiliate/postback`（partner）下，
//! 调用方角色由中间件写入的 [`Caller`] 决定。

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use serde_json::{Map, Value};
use tracing::info;

use crate::api::AppState;
use crate::api::middleware::Caller;
use crate::errors::{ClicktrailError, FieldError};
use crate::postback::request::validate_endpoint;
use crate::postback::{CallerRole, Dispatcher, PostbackEvent};
use crate::services::ProfileInput;
use crate::storage::models::{DeliveryQuery, ProfileDraft};
use crate::tracking::EventInput;
use crate::tracking::click_id::generate_click_id;

use super::error_code::ErrorCode;
use super::helpers::{
    created_response, error_from_clicktrail, error_response, json_response, not_found_as,
    success_response,
};
use super::types::{
    DeliveriesQuery, DryRunResponse, ManualSendRequest, ManualSendResponse, PostbackTestRequest,
};

pub const DEFAULT_DELIVERY_LIMIT: u64 = 50;
pub const MAX_DELIVERY_LIMIT: u64 = 500;

/// 未提供 params_template 时 dry-run 使用的参数
const DEFAULT_TEST_PARAMS: &[(&str, &str)] = &[
    ("clickid", "{{clickid}}"),
    ("status", "{{status}}"),
    ("payout", "{{revenue}}"),
    ("currency", "{{currency}}"),
    ("txid", "{{txid}}"),
];

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// dry-run 用的示例事件；调用方自己填在对应的 owner 位置
pub(crate) fn sample_event(caller: &Caller, overrides: Option<&Map<String, Value>>) -> PostbackEvent {
    let (advertiser_id, partner_id) = match caller.role {
        CallerRole::Advertiser => (caller.owner_id.clone(), "test_partner".to_string()),
        CallerRole::Partner => ("test_advertiser".to_string(), caller.owner_id.clone()),
    };
    let mut event = PostbackEvent {
        event_type: "deposit".to_string(),
        click_id: generate_click_id(),
        event_id: None,
        partner_id,
        offer_id: "test_offer".to_string(),
        advertiser_id: Some(advertiser_id),
        campaign_id: None,
        flow_id: None,
        revenue: Some(10.0),
        currency: Some("USD".to_string()),
        txid: Some("test-txid".to_string()),
        country: Some("US".to_string()),
        is_bot: false,
        data: Default::default(),
    };

    let Some(overrides) = overrides else {
        return event;
    };
    for (key, value) in overrides {
        let text = value_to_string(value);
        match key.as_str() {
            "clickid" | "click_id" => {
                if let Some(v) = text {
                    event.click_id = v;
                }
            }
            "type" | "event_type" => {
                if let Some(v) = text {
                    event.event_type = v;
                }
            }
            "partner_id" => {
                if let Some(v) = text {
                    event.partner_id = v;
                }
            }
            "offer_id" => {
                if let Some(v) = text {
                    event.offer_id = v;
                }
            }
            "advertiser_id" => event.advertiser_id = text,
            "campaign_id" => event.campaign_id = text,
            "flow_id" => event.flow_id = text,
            "revenue" => event.revenue = text.and_then(|v| v.parse().ok()),
            "currency" => event.currency = text,
            "txid" => event.txid = text,
            "country" => event.country = text,
            "is_bot" => event.is_bot = value.as_bool().unwrap_or(false),
            _ => {
                if let Some(v) = text {
                    event.data.insert(key.clone(), v);
                }
            }
        }
    }
    event
}

fn dry_run_response(settings: &ProfileDraft, event: PostbackEvent) -> HttpResponse {
    match Dispatcher::dry_run(settings, &event) {
        Ok(request) => success_response(DryRunResponse {
            sent: false,
            request,
            event,
        }),
        Err(e) => error_response(StatusCode::BAD_REQUEST, ErrorCode::PostbackRenderFailed, &e),
    }
}

/// 把 `/postback/test` 的请求体转成临时 profile
fn draft_from_test_request(body: &PostbackTestRequest) -> Result<ProfileDraft, ClicktrailError> {
    let url = body
        .tracker_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ClicktrailError::invalid_fields(
                "测试参数无效",
                vec![FieldError::new("tracker_url", "is required")],
            )
        })?;
    if let Err(e) = validate_endpoint(url) {
        return Err(ClicktrailError::invalid_fields(
            "测试参数无效",
            vec![FieldError::new("tracker_url", e)],
        ));
    }

    let mut draft = ProfileDraft::new("test", url);
    if let Some(method) = body.method {
        draft.method = method;
    }
    if let Some(auth) = &body.auth {
        draft.auth_query_key = auth.query_key.clone();
        draft.auth_query_val = auth.query_val.clone();
        draft.auth_header_key = auth.header_key.clone();
        draft.auth_header_val = auth.header_val.clone();
    }
    if let Some(hmac) = &body.hmac {
        draft.hmac_enabled = true;
        draft.hmac_secret = hmac.secret.clone();
        draft.hmac_payload_tpl = hmac.payload_tpl.clone();
        draft.hmac_param_name = hmac.param_name.clone();
        if let Some(encoding) = hmac.encoding {
            draft.hmac_encoding = encoding;
        }
    }
    if let Some(timeout) = body.timeout {
        draft.timeout_ms = timeout;
    }
    draft.params_template = match &body.params_template {
        Some(t) if !t.is_empty() => t.clone(),
        _ => DEFAULT_TEST_PARAMS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };
    if let Some(map) = &body.status_map {
        draft.status_map = map.clone();
    }
    if let Some(encode) = body.url_encode {
        draft.url_encode = encode;
    }
    Ok(draft)
}

/// `POST /postback/send`：对指定点击立即投递（走真实网络）
pub async fn send_postback(
    caller: web::ReqData<Caller>,
    body: web::Json<ManualSendRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let body = body.into_inner();
    let input = EventInput {
        clickid: body.clickid,
        event_type: body.event_type,
        revenue: body.revenue,
        currency: body.currency,
        txid: body.txid,
    };

    let event = match state.tracking.manual_event(&caller.owner_id, input).await {
        Ok(e) => e,
        Err(e) => return not_found_as(&e, ErrorCode::ClickNotFound),
    };

    match state
        .dispatcher
        .send_manual(&caller.owner_id, &event, body.force)
        .await
    {
        Ok(summary) => success_response(ManualSendResponse {
            clickid: event.click_id,
            event_type: event.event_type,
            summary,
        }),
        Err(e) => error_from_clicktrail(&e),
    }
}

/// `POST /postback/test`：只渲染，不发送
pub async fn test_postback(
    caller: web::ReqData<Caller>,
    body: web::Json<PostbackTestRequest>,
) -> impl Responder {
    let body = body.into_inner();
    let draft = match draft_from_test_request(&body) {
        Ok(d) => d,
        Err(e) => return error_from_clicktrail(&e),
    };
    let event = sample_event(&caller, body.test_data.as_ref());
    dry_run_response(&draft, event)
}

/// `GET /postback/profiles`
pub async fn list_profiles(
    caller: web::ReqData<Caller>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state.profiles.list(&caller.owner_id).await {
        Ok(profiles) => success_response(profiles),
        Err(e) => error_from_clicktrail(&e),
    }
}

/// `GET /postback/profiles/{id}`
pub async fn get_profile(
    caller: web::ReqData<Caller>,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state.profiles.get(&caller.owner_id, &path.into_inner()).await {
        Ok(profile) => success_response(profile),
        Err(e) => not_found_as(&e, ErrorCode::ProfileNotFound),
    }
}

/// `POST /postback/profiles`
pub async fn create_profile(
    caller: web::ReqData<Caller>,
    body: web::Json<ProfileInput>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state
        .profiles
        .create(&caller.owner_id, caller.role, body.into_inner())
        .await
    {
        Ok(profile) => {
            info!(
                "Postback profile {} created by {} ({:?})",
                profile.id, caller.owner_id, caller.role
            );
            created_response(profile)
        }
        Err(e) => error_from_clicktrail(&e),
    }
}

/// `PUT /postback/profiles/{id}`
pub async fn update_profile(
    caller: web::ReqData<Caller>,
    path: web::Path<String>,
    body: web::Json<ProfileInput>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state
        .profiles
        .update(&caller.owner_id, caller.role, &path.into_inner(), body.into_inner())
        .await
    {
        Ok(profile) => success_response(profile),
        Err(e) => not_found_as(&e, ErrorCode::ProfileNotFound),
    }
}

/// `DELETE /postback/profiles/{id}`
pub async fn delete_profile(
    caller: web::ReqData<Caller>,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> impl Responder {
    let id = path.into_inner();
    match state.profiles.delete(&caller.owner_id, &id).await {
        Ok(()) => json_response::<()>(StatusCode::OK, ErrorCode::Success, "Deleted", None),
        Err(e) => not_found_as(&e, ErrorCode::ProfileNotFound),
    }
}

/// `POST /postback/profiles/{id}/test`：用示例数据渲染已保存的 profile
pub async fn test_profile(
    caller: web::ReqData<Caller>,
    path: web::Path<String>,
    body: Option<web::Json<Map<String, Value>>>,
    state: web::Data<AppState>,
) -> impl Responder {
    let profile = match state.profiles.get(&caller.owner_id, &path.into_inner()).await {
        Ok(p) => p,
        Err(e) => return not_found_as(&e, ErrorCode::ProfileNotFound),
    };
    let overrides = body.map(|b| b.into_inner());
    let event = sample_event(&caller, overrides.as_ref());
    dry_run_response(&profile.settings, event)
}

/// `GET /postback/deliveries?limit=&profile_id=&clickid=`
pub async fn list_deliveries(
    caller: web::ReqData<Caller>,
    query: web::Query<DeliveriesQuery>,
    state: web::Data<AppState>,
) -> impl Responder {
    let query = query.into_inner();
    let delivery_query = DeliveryQuery {
        owner_id: caller.owner_id.clone(),
        profile_id: query.profile_id.filter(|s| !s.is_empty()),
        click_id: query.clickid.filter(|s| !s.is_empty()),
        limit: query
            .limit
            .unwrap_or(DEFAULT_DELIVERY_LIMIT)
            .clamp(1, MAX_DELIVERY_LIMIT),
    };
    match state.deliveries.recent_deliveries(&delivery_query).await {
        Ok(rows) => success_response(rows),
        Err(e) => error_from_clicktrail(&e),
    }
}
