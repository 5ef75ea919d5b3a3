use std::fmt;

use actix_web::http::StatusCode;
use serde::Serialize;

/// 字段级校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClicktrailError {
    Validation(String),
    InvalidFields(String, Vec<FieldError>),
    NotFound(String),
    Unauthorized(String),
    Blocked(String),
    Delivery(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Serialization(String),
    Internal(String),
}

impl ClicktrailError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ClicktrailError::Validation(_) => "E001",
            ClicktrailError::InvalidFields(..) => "E002",
            ClicktrailError::NotFound(_) => "E003",
            ClicktrailError::Unauthorized(_) => "E004",
            ClicktrailError::Blocked(_) => "E005",
            ClicktrailError::Delivery(_) => "E006",
            ClicktrailError::DatabaseConfig(_) => "E007",
            ClicktrailError::DatabaseConnection(_) => "E008",
            ClicktrailError::DatabaseOperation(_) => "E009",
            ClicktrailError::Serialization(_) => "E010",
            ClicktrailError::Internal(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ClicktrailError::Validation(_) => "Validation Error",
            ClicktrailError::InvalidFields(..) => "Invalid Fields",
            ClicktrailError::NotFound(_) => "Resource Not Found",
            ClicktrailError::Unauthorized(_) => "Unauthorized",
            ClicktrailError::Blocked(_) => "Blocked",
            ClicktrailError::Delivery(_) => "Delivery Error",
            ClicktrailError::DatabaseConfig(_) => "Database Configuration Error",
            ClicktrailError::DatabaseConnection(_) => "Database Connection Error",
            ClicktrailError::DatabaseOperation(_) => "Database Operation Error",
            ClicktrailError::Serialization(_) => "Serialization Error",
            ClicktrailError::Internal(_) => "Internal Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ClicktrailError::Validation(msg)
            | ClicktrailError::InvalidFields(msg, _)
            | ClicktrailError::NotFound(msg)
            | ClicktrailError::Unauthorized(msg)
            | ClicktrailError::Blocked(msg)
            | ClicktrailError::Delivery(msg)
            | ClicktrailError::DatabaseConfig(msg)
            | ClicktrailError::DatabaseConnection(msg)
            | ClicktrailError::DatabaseOperation(msg)
            | ClicktrailError::Serialization(msg)
            | ClicktrailError::Internal(msg) => msg,
        }
    }

    /// 字段级错误（仅 InvalidFields 有）
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ClicktrailError::InvalidFields(_, fields) => fields,
            _ => &[],
        }
    }

    /// 映射到 HTTP 状态码
    pub fn http_status(&self) -> StatusCode {
        match self {
            ClicktrailError::Validation(_) | ClicktrailError::InvalidFields(..) => {
                StatusCode::BAD_REQUEST
            }
            ClicktrailError::NotFound(_) => StatusCode::NOT_FOUND,
            ClicktrailError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ClicktrailError::Blocked(_) => StatusCode::FORBIDDEN,
            ClicktrailError::Delivery(_) => StatusCode::BAD_GATEWAY,
            ClicktrailError::DatabaseConfig(_)
            | ClicktrailError::DatabaseConnection(_)
            | ClicktrailError::DatabaseOperation(_)
            | ClicktrailError::Serialization(_)
            | ClicktrailError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 是否为内部错误（不应把细节暴露给调用方）
    pub fn is_internal(&self) -> bool {
        self.http_status() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// 格式化为彩色输出（用于 Server 模式）
    #[cfg(feature = "server")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        match self {
            ClicktrailError::InvalidFields(msg, fields) if !fields.is_empty() => {
                let detail: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.field, f.message))
                    .collect();
                format!("{}: {} ({})", self.error_type(), msg, detail.join("; "))
            }
            _ => format!("{}: {}", self.error_type(), self.message()),
        }
    }
}

impl fmt::Display for ClicktrailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ClicktrailError {}

// 便捷的构造函数
impl ClicktrailError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::Validation(msg.into())
    }

    pub fn invalid_fields<T: Into<String>>(msg: T, fields: Vec<FieldError>) -> Self {
        ClicktrailError::InvalidFields(msg.into(), fields)
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::NotFound(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::Unauthorized(msg.into())
    }

    pub fn blocked<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::Blocked(msg.into())
    }

    pub fn delivery<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::Delivery(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::DatabaseOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::Serialization(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ClicktrailError::Internal(msg.into())
    }
}

impl From<sea_orm::DbErr> for ClicktrailError {
    fn from(err: sea_orm::DbErr) -> Self {
        ClicktrailError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for ClicktrailError {
    fn from(err: std::io::Error) -> Self {
        ClicktrailError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ClicktrailError {
    fn from(err: serde_json::Error) -> Self {
        ClicktrailError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClicktrailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            ClicktrailError::validation("x").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClicktrailError::invalid_fields("x", vec![]).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClicktrailError::not_found("x").http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ClicktrailError::blocked("x").http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ClicktrailError::database_operation("x").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(ClicktrailError::internal("x").is_internal());
        assert!(!ClicktrailError::unauthorized("x").is_internal());
    }

    #[test]
    fn test_format_simple_includes_field_detail() {
        let err = ClicktrailError::invalid_fields(
            "event rejected",
            vec![FieldError::new("currency", "must be a 3-letter ISO code")],
        );
        let s = err.format_simple();
        assert!(s.contains("event rejected"));
        assert!(s.contains("currency: must be a 3-letter ISO code"));
        assert_eq!(err.field_errors().len(), 1);
    }

    #[test]
    fn test_db_err_converts_to_operation_error() {
        let err: ClicktrailError = sea_orm::DbErr::Custom("boom".into()).into();
        assert!(matches!(err, ClicktrailError::DatabaseOperation(_)));
        assert_eq!(err.code(), "E009");
    }
}
