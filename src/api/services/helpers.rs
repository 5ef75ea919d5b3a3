//! API 帮助函数

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::errors::{ClicktrailError, FieldError};

use super::error_code::ErrorCode;
use super::types::ApiResponse;

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: code as i32,
            message: message.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
}

/// 201 Created
pub fn created_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::CREATED, ErrorCode::Success, "Created", Some(data))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, error_code: ErrorCode, message: &str) -> HttpResponse {
    json_response::<()>(status, error_code, message, None)
}

/// 从 ClicktrailError 构建错误响应
///
/// 内部错误只返回通用消息，细节进日志；字段错误放进 data。
pub fn error_from_clicktrail(err: &ClicktrailError) -> HttpResponse {
    error_with_code(err, ErrorCode::from(err))
}

/// 同上，但由调用方指定业务错误码（例如区分点击与 offer 的 404）
pub fn error_with_code(err: &ClicktrailError, code: ErrorCode) -> HttpResponse {
    let status = err.http_status();
    if err.is_internal() {
        error!("Request failed: {}", err);
        return error_response(status, code, "Internal server error");
    }
    match err.field_errors() {
        [] => error_response(status, code, err.message()),
        fields => json_response::<Vec<FieldError>>(status, code, err.message(), Some(fields.to_vec())),
    }
}

/// 统一 Result → HttpResponse 转换
pub fn api_result<T: Serialize>(result: crate::errors::Result<T>) -> HttpResponse {
    match result {
        Ok(data) => success_response(data),
        Err(e) => error_from_clicktrail(&e),
    }
}

/// 404 时改用更具体的错误码
pub fn not_found_as(err: &ClicktrailError, code: ErrorCode) -> HttpResponse {
    match err {
        ClicktrailError::NotFound(_) => error_with_code(err, code),
        _ => error_from_clicktrail(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = success_response("success_data");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_created_response() {
        assert_eq!(created_response(1).status(), StatusCode::CREATED);
    }

    #[test]
    fn test_error_from_clicktrail_status() {
        let resp = error_from_clicktrail(&ClicktrailError::not_found("missing"));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = error_from_clicktrail(&ClicktrailError::blocked("no"));
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = error_from_clicktrail(&ClicktrailError::database_operation("boom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_as_keeps_other_errors() {
        let resp = not_found_as(&ClicktrailError::validation("bad"), ErrorCode::ClickNotFound);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
