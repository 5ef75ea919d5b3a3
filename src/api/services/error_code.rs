//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::ClicktrailError;

/// API 错误码枚举
///
/// 使用 serde_repr 序列化为数字，按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 2000-2099: 调用方身份错误
/// - 3000-3099: 点击/事件追踪错误
/// - 4000-4099: 回传错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    // 成功
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    Unauthorized = 1001,
    ValidationFailed = 1002,
    NotFound = 1004,
    InternalServerError = 1005,
    ServiceUnavailable = 1030,

    // 调用方身份错误 2000-2099
    TokenInvalid = 2000,
    OwnerMissing = 2001,

    // 追踪错误 3000-3099
    ClickNotFound = 3000,
    OfferNotFound = 3001,
    TrackingCodeNotFound = 3002,
    ClickBlocked = 3003,
    BlacklistEntryNotFound = 3004,

    // 回传错误 4000-4099
    ProfileNotFound = 4000,
    PostbackRenderFailed = 4001,
    DeliveryFailed = 4002,
}

impl From<&ClicktrailError> for ErrorCode {
    fn from(err: &ClicktrailError) -> Self {
        match err {
            ClicktrailError::Validation(_) => ErrorCode::BadRequest,
            ClicktrailError::InvalidFields(..) => ErrorCode::ValidationFailed,
            ClicktrailError::NotFound(_) => ErrorCode::NotFound,
            ClicktrailError::Unauthorized(_) => ErrorCode::Unauthorized,
            ClicktrailError::Blocked(_) => ErrorCode::ClickBlocked,
            ClicktrailError::Delivery(_) => ErrorCode::DeliveryFailed,
            ClicktrailError::DatabaseConfig(_)
            | ClicktrailError::DatabaseConnection(_)
            | ClicktrailError::DatabaseOperation(_)
            | ClicktrailError::Serialization(_)
            | ClicktrailError::Internal(_) => ErrorCode::InternalServerError,
        }
    }
}
