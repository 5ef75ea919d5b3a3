//! 追踪路由：点击跳转、事件上报、点击查询、offer 注册

use std::collections::BTreeMap;

use actix_web::http::header::LOCATION;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use tracing::{debug, trace};

use crate::api::middleware::Caller;
use crate::api::{AppState, ClientSettings};
use crate::storage::models::{SubValues, Utm, sub_index};
use crate::tracking::click_id::{is_valid_click_id, is_valid_tracking_code};
use crate::tracking::{
    ClickRequest, ClickSource, ClientInfo, EventInput, OfferInput, TrackingLinkInput,
};
use crate::utils::ip::extract_client_ip;

use super::error_code::ErrorCode;
use super::helpers::{
    created_response, error_from_clicktrail, error_response, not_found_as,
    success_response,
};
use super::types::ClickDetailResponse;

type QueryMap = web::Query<BTreeMap<String, String>>;

fn query_value(query: &BTreeMap<String, String>, key: &str) -> Option<String> {
    query
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn subs_from_query(query: &BTreeMap<String, String>) -> SubValues {
    let mut subs = SubValues::default();
    for (key, value) in query {
        if let Some(n) = sub_index(key) {
            subs.set(n, Some(value.trim().to_string()));
        }
    }
    subs
}

pub(crate) fn utm_from_query(query: &BTreeMap<String, String>) -> Utm {
    Utm {
        source: query_value(query, "utm_source"),
        medium: query_value(query, "utm_medium"),
        campaign: query_value(query, "utm_campaign"),
        term: query_value(query, "utm_term"),
        content: query_value(query, "utm_content"),
    }
}

pub(crate) fn client_info(req: &HttpRequest, settings: &ClientSettings) -> ClientInfo {
    ClientInfo {
        ip: extract_client_ip(req, &settings.trusted_proxies),
        user_agent: header_value(req, "User-Agent"),
        referrer: header_value(req, "Referer"),
        country_hint: if settings.country_header.is_empty() {
            None
        } else {
            header_value(req, &settings.country_header)
        },
    }
}

fn build_click_request(
    req: &HttpRequest,
    query: &BTreeMap<String, String>,
    source: ClickSource,
    settings: &ClientSettings,
) -> ClickRequest {
    ClickRequest {
        source,
        subs: subs_from_query(query),
        utm: utm_from_query(query),
        client: client_info(req, settings),
        device_id: query_value(query, "device_id"),
    }
}

async fn redirect(state: &AppState, request: ClickRequest) -> HttpResponse {
    match state.tracking.ingest_click(request).await {
        Ok(outcome) => {
            trace!("Redirecting {} to {}", outcome.click.click_id, outcome.redirect_url);
            HttpResponse::Found()
                .insert_header((LOCATION, outcome.redirect_url))
                .finish()
        }
        Err(e) => error_from_clicktrail(&e),
    }
}

/// `GET /click?offer=&partner=&subN=&utm_*=`
pub async fn click(req: HttpRequest, query: QueryMap, state: web::Data<AppState>) -> impl Responder {
    let query = query.into_inner();
    let source = ClickSource::Direct {
        offer_id: query_value(&query, "offer"),
        partner_id: query_value(&query, "partner"),
    };
    let request = build_click_request(&req, &query, source, &state.client);
    redirect(&state, request).await
}

/// `GET /{code}`
pub async fn tracking_link(
    req: HttpRequest,
    path: web::Path<String>,
    query: QueryMap,
    state: web::Data<AppState>,
) -> impl Responder {
    let code = path.into_inner();
    if !is_valid_tracking_code(&code) {
        debug!("Invalid tracking code rejected: {}", code);
        return error_response(
            actix_web::http::StatusCode::NOT_FOUND,
            ErrorCode::TrackingCodeNotFound,
            "Tracking code not found",
        );
    }
    let query = query.into_inner();
    let request = build_click_request(&req, &query, ClickSource::Code(code), &state.client);
    redirect(&state, request).await
}

/// `POST /event`
pub async fn post_event(body: web::Json<EventInput>, state: web::Data<AppState>) -> impl Responder {
    match state.tracking.ingest_event(body.into_inner()).await {
        Ok(event) => created_response(event),
        Err(e) => not_found_as(&e, ErrorCode::ClickNotFound),
    }
}

/// `GET /click/{clickid}`
pub async fn get_click(path: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    let click_id = path.into_inner();
    if !is_valid_click_id(&click_id) {
        return error_response(
            actix_web::http::StatusCode::NOT_FOUND,
            ErrorCode::ClickNotFound,
            "Click not found",
        );
    }
    match state.tracking.get_click_with_events(&click_id).await {
        Ok((click, events)) => success_response(ClickDetailResponse { click, events }),
        Err(e) => not_found_as(&e, ErrorCode::ClickNotFound),
    }
}

/// `PUT /offers/{id}`
pub async fn put_offer(
    caller: web::ReqData<Caller>,
    path: web::Path<String>,
    body: web::Json<OfferInput>,
    state: web::Data<AppState>,
) -> impl Responder {
    let offer_id = path.into_inner();
    match state
        .tracking
        .register_offer(&caller.owner_id, &offer_id, body.into_inner())
        .await
    {
        Ok(offer) => success_response(offer),
        Err(e) => not_found_as(&e, ErrorCode::OfferNotFound),
    }
}

/// `POST /affiliate/tracking-links`
pub async fn post_tracking_link(
    caller: web::ReqData<Caller>,
    body: web::Json<TrackingLinkInput>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state
        .tracking
        .create_tracking_link(&caller.owner_id, body.into_inner())
        .await
    {
        Ok(link) => created_response(link),
        Err(e) => not_found_as(&e, ErrorCode::OfferNotFound),
    }
}
