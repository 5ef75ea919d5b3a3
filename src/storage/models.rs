//! 领域模型
//!
//! 存储层以外只看到这些类型；自增主键在这里统一表示为十进制字符串。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// sub 参数个数（sub1..sub16）
pub const SUB_COUNT: usize = 16;

/// partner 传入的 sub1..sub16
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubValues([Option<String>; SUB_COUNT]);

impl SubValues {
    /// 按 1 起始的序号读取
    pub fn get(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.0.get(i))
            .and_then(|v| v.as_deref())
    }

    /// 按 1 起始的序号写入；空字符串视为未设置
    pub fn set(&mut self, n: usize, value: Option<String>) {
        if let Some(slot) = n.checked_sub(1).and_then(|i| self.0.get_mut(i)) {
            *slot = value.filter(|v| !v.is_empty());
        }
    }

    /// 遍历已设置的 (序号, 值)
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_deref().map(|v| (i + 1, v)))
    }

    /// 用 `other` 中已设置的值覆盖自身
    pub fn overlay(&mut self, other: &SubValues) {
        for (n, v) in other.iter() {
            self.set(n, Some(v.to_string()));
        }
    }

    pub fn into_array(self) -> [Option<String>; SUB_COUNT] {
        self.0
    }

    pub fn from_array(values: [Option<String>; SUB_COUNT]) -> Self {
        let mut subs = SubValues::default();
        for (i, v) in values.into_iter().enumerate() {
            subs.set(i + 1, v);
        }
        subs
    }

    /// 转为 {"sub1": "..."} 形式
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(n, v)| (format!("sub{}", n), v.to_string()))
            .collect()
    }

    /// 从 {"sub1": "..."} 形式读取，忽略无法识别的键
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let mut subs = SubValues::default();
        for (k, v) in map {
            if let Some(n) = sub_index(k) {
                subs.set(n, Some(v.clone()));
            }
        }
        subs
    }
}

/// "sub7" -> Some(7)
pub fn sub_index(key: &str) -> Option<usize> {
    key.strip_prefix("sub")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=SUB_COUNT).contains(n))
}

impl Serialize for SubValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (n, v) in self.iter() {
            map.serialize_entry(&format!("sub{}", n), v)?;
        }
        map.end()
    }
}

/// UTM 参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Utm {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

impl Utm {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("utm_source", &self.source),
            ("utm_medium", &self.medium),
            ("utm_campaign", &self.campaign),
            ("utm_term", &self.term),
            ("utm_content", &self.content),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
    }
}

/// 外部解析得到的设备/地理信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Enrichment {
    pub country: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
    pub is_bot: bool,
}

/// 广告主发布的 offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offer {
    pub id: String,
    pub advertiser_id: String,
    pub campaign_id: Option<String>,
    pub name: Option<String>,
    pub landing_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// partner 生成的短跟踪码
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingLink {
    pub code: String,
    pub partner_id: String,
    pub offer_id: String,
    pub flow_id: Option<String>,
    pub default_subs: SubValues,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
}

/// 一次归因到 partner/offer 的访问
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Click {
    pub click_id: String,
    pub advertiser_id: String,
    pub partner_id: String,
    pub offer_id: String,
    pub campaign_id: Option<String>,
    pub flow_id: Option<String>,
    pub tracking_code: Option<String>,
    pub subs: SubValues,
    /// sub2 按 `key-value|key-value` 解析的结果，解析失败为 None
    pub sub2_parsed: Option<BTreeMap<String, String>>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub utm: Utm,
    pub enrichment: Enrichment,
    pub created_at: DateTime<Utc>,
}

/// 归因到某次点击的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: String,
    pub click_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub revenue: Option<f64>,
    pub currency: Option<String>,
    pub txid: Option<String>,
    pub advertiser_id: String,
    pub partner_id: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的事件
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub click_id: String,
    pub event_type: String,
    pub revenue: Option<f64>,
    pub currency: Option<String>,
    pub txid: Option<String>,
    pub advertiser_id: String,
    pub partner_id: String,
}

/// 回传作用域
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScopeType {
    #[default]
    Global,
    Campaign,
    Offer,
    Flow,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// tracker 回传确认时使用的 id 概念
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IdParam {
    Subid,
    #[default]
    Clickid,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HmacEncoding {
    #[default]
    Hex,
    Base64,
}

/// 回传配置的可写部分（创建、更新共用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileDraft {
    pub name: String,
    pub scope_type: ScopeType,
    pub scope_id: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub endpoint_url: String,
    pub method: HttpMethod,
    pub id_param: IdParam,
    pub auth_query_key: Option<String>,
    pub auth_query_val: Option<String>,
    pub auth_header_key: Option<String>,
    pub auth_header_val: Option<String>,
    pub hmac_enabled: bool,
    pub hmac_secret: Option<String>,
    pub hmac_payload_tpl: Option<String>,
    pub hmac_param_name: Option<String>,
    pub hmac_encoding: HmacEncoding,
    pub status_map: BTreeMap<String, String>,
    pub params_template: BTreeMap<String, String>,
    pub url_encode: bool,
    pub retries: u32,
    pub timeout_ms: u64,
    pub backoff_base_sec: u64,
    pub filter_revenue_gt0: bool,
    pub filter_country_whitelist: Vec<String>,
    pub filter_country_blacklist: Vec<String>,
    pub filter_exclude_bots: bool,
}

impl ProfileDraft {
    /// 最小可用配置，其余字段取默认值
    pub fn new(name: impl Into<String>, endpoint_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope_type: ScopeType::Global,
            scope_id: None,
            priority: 0,
            enabled: true,
            endpoint_url: endpoint_url.into(),
            method: HttpMethod::Get,
            id_param: IdParam::Clickid,
            auth_query_key: None,
            auth_query_val: None,
            auth_header_key: None,
            auth_header_val: None,
            hmac_enabled: false,
            hmac_secret: None,
            hmac_payload_tpl: None,
            hmac_param_name: None,
            hmac_encoding: HmacEncoding::Hex,
            status_map: BTreeMap::new(),
            params_template: BTreeMap::new(),
            url_encode: true,
            retries: 3,
            timeout_ms: 5000,
            backoff_base_sec: 2,
            filter_revenue_gt0: false,
            filter_country_whitelist: Vec::new(),
            filter_country_blacklist: Vec::new(),
            filter_exclude_bots: false,
        }
    }
}

/// 一个回传目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostbackProfile {
    pub id: String,
    pub owner_id: String,
    #[serde(flatten)]
    pub settings: ProfileDraft,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待写入的投递记录（每次尝试一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDelivery {
    pub profile_id: String,
    pub event_id: Option<String>,
    pub click_id: String,
    pub event_type: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub request_method: String,
    pub request_url: String,
    pub request_body: Option<String>,
    pub response_code: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// 已写入的投递记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    pub id: String,
    #[serde(flatten)]
    pub attempt: NewDelivery,
    pub created_at: DateTime<Utc>,
}

/// 投递日志查询条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryQuery {
    pub owner_id: String,
    pub profile_id: Option<String>,
    pub click_id: Option<String>,
    pub limit: u64,
}

/// 黑名单条目类型
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BlacklistKind {
    Ip,
    DeviceId,
    Clickid,
    Subid,
    UserAgent,
    Domain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlacklistEntry {
    pub id: String,
    pub kind: BlacklistKind,
    pub value: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BlacklistEntry {
    /// 过期条目不再生效
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBlacklistEntry {
    pub kind: BlacklistKind,
    pub value: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sub_values_are_one_based() {
        let mut subs = SubValues::default();
        subs.set(1, Some("a".into()));
        subs.set(16, Some("p".into()));
        subs.set(17, Some("ignored".into()));
        subs.set(0, Some("ignored".into()));
        subs.set(3, Some(String::new()));

        assert_eq!(subs.get(1), Some("a"));
        assert_eq!(subs.get(16), Some("p"));
        assert_eq!(subs.get(3), None);
        assert_eq!(subs.get(0), None);
        assert_eq!(subs.iter().count(), 2);
    }

    #[test]
    fn test_sub_values_serialize_as_map() {
        let mut subs = SubValues::default();
        subs.set(2, Some("geo-US".into()));
        let json = serde_json::to_value(&subs).unwrap();
        assert_eq!(json, serde_json::json!({"sub2": "geo-US"}));
    }

    #[test]
    fn test_overlay_keeps_unset_defaults() {
        let mut base = SubValues::default();
        base.set(1, Some("default1".into()));
        base.set(2, Some("default2".into()));
        let mut over = SubValues::default();
        over.set(2, Some("override".into()));

        base.overlay(&over);
        assert_eq!(base.get(1), Some("default1"));
        assert_eq!(base.get(2), Some("override"));
    }

    #[test]
    fn test_sub_index() {
        assert_eq!(sub_index("sub1"), Some(1));
        assert_eq!(sub_index("sub16"), Some(16));
        assert_eq!(sub_index("sub17"), None);
        assert_eq!(sub_index("subx"), None);
        assert_eq!(sub_index("utm_source"), None);
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(ScopeType::from_str("OFFER").unwrap(), ScopeType::Offer);
        assert_eq!(HttpMethod::Post.as_ref(), "POST");
        assert_eq!(BlacklistKind::UserAgent.as_ref(), "user_agent");
        assert_eq!(
            BlacklistKind::from_str("device_id").unwrap(),
            BlacklistKind::DeviceId
        );
    }

    #[test]
    fn test_expired_blacklist_entry_is_inactive() {
        let now = Utc::now();
        let mut entry = BlacklistEntry {
            id: "1".into(),
            kind: BlacklistKind::Ip,
            value: "1.2.3.4".into(),
            reason: None,
            expires_at: Some(now - chrono::Duration::seconds(1)),
            created_at: now,
        };
        assert!(!entry.is_active(now));
        entry.expires_at = None;
        assert!(entry.is_active(now));
    }
}
