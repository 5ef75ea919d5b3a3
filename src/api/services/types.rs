//! API 请求/响应类型

use serde::{Deserialize, Serialize};

use crate::postback::request::PreparedRequest;
use crate::postback::{DispatchSummary, PostbackEvent};
use crate::storage::models::{Click, Event, HmacEncoding, HttpMethod};

/// 统一响应信封
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// `GET /click/{clickid}`
#[derive(Serialize, Clone, Debug)]
pub struct ClickDetailResponse {
    pub click: Click,
    pub events: Vec<Event>,
}

/// `POST /postback/send`
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct ManualSendRequest {
    pub clickid: Option<String>,
    pub event_type: Option<String>,
    pub revenue: Option<serde_json::Value>,
    pub currency: Option<String>,
    pub txid: Option<String>,
    /// 跳过过滤条件
    pub force: bool,
}

#[derive(Serialize, Clone, Debug)]
pub struct ManualSendResponse {
    pub clickid: String,
    pub event_type: String,
    #[serde(flatten)]
    pub summary: DispatchSummary,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct TestAuth {
    pub query_key: Option<String>,
    pub query_val: Option<String>,
    pub header_key: Option<String>,
    pub header_val: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct TestHmac {
    pub secret: Option<String>,
    pub payload_tpl: Option<String>,
    pub param_name: Option<String>,
    pub encoding: Option<HmacEncoding>,
}

/// `POST /postback/test`：临时 profile 的 dry-run
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct PostbackTestRequest {
    pub tracker_url: Option<String>,
    pub method: Option<HttpMethod>,
    pub auth: Option<TestAuth>,
    pub hmac: Option<TestHmac>,
    /// 毫秒
    pub timeout: Option<u64>,
    pub params_template: Option<std::collections::BTreeMap<String, String>>,
    pub status_map: Option<std::collections::BTreeMap<String, String>>,
    pub url_encode: Option<bool>,
    /// 覆盖示例事件的字段（clickid、event_type、revenue、sub1 等）
    pub test_data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// dry-run 结果，`sent` 恒为 false
#[derive(Serialize, Clone, Debug)]
pub struct DryRunResponse {
    pub sent: bool,
    pub request: PreparedRequest,
    pub event: PostbackEvent,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct DeliveriesQuery {
    pub limit: Option<u64>,
    pub profile_id: Option<String>,
    pub clickid: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime: u64,
    pub database: String,
    pub queue_depth: usize,
    pub accepting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
