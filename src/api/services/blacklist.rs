//! 黑名单管理路由 `/blacklist`

use actix_web::http::StatusCode;
use actix_web::{Responder, web};
use tracing::info;

use crate::api::AppState;
use crate::api::middleware::Caller;
use crate::storage::models::NewBlacklistEntry;

use super::error_code::ErrorCode;
use super::helpers::{
    api_result, created_response, error_from_clicktrail, json_response, not_found_as,
};

/// `GET /blacklist`
pub async fn list_entries(state: web::Data<AppState>) -> impl Responder {
    api_result(state.blacklist.list().await)
}

/// `POST /blacklist`
pub async fn add_entry(
    caller: web::ReqData<Caller>,
    body: web::Json<NewBlacklistEntry>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state.blacklist.add(body.into_inner()).await {
        Ok(entry) => {
            info!("Blacklist entry {} added by {}", entry.id, caller.owner_id);
            created_response(entry)
        }
        Err(e) => error_from_clicktrail(&e),
    }
}

/// `DELETE /blacklist/{id}`
pub async fn delete_entry(
    caller: web::ReqData<Caller>,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> impl Responder {
    let id = path.into_inner();
    match state.blacklist.remove(&id).await {
        Ok(()) => {
            info!("Blacklist entry {} removed by {}", id, caller.owner_id);
            json_response::<()>(StatusCode::OK, ErrorCode::Success, "Deleted", None)
        }
        Err(e) => not_found_as(&e, ErrorCode::BlacklistEntryNotFound),
    }
}
