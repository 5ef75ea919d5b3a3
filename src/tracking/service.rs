//! 点击与事件入口
//!
//! 点击：校验 → 合并跟踪链接默认 sub → 黑名单 → 解析 offer → 补全 → 同一事务写点击
//! 和 open 事件 → 提交 lp_click 回传 → 渲染落地页。
//! 事件：校验 → clickid 黑名单 → 查点击 → 写事件 → 提交回传。
//! 回传只入队，不等待结果。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::click_id::{generate_click_id, generate_tracking_code, is_valid_click_id};
use super::enrichment::{ClickEnricher, ClientInfo};
use super::landing::{landing_template, render_landing_url};
use super::sub_params::parse_sub2;
use crate::errors::{ClicktrailError, FieldError, Result};
use crate::postback::event::{LP_CLICK_EVENT, OPEN_EVENT, PostbackEvent};
use crate::postback::queue::PostbackSink;
use crate::postback::request::validate_endpoint;
use crate::services::BlacklistFilter;
use crate::storage::models::{
    BlacklistKind, Click, Event, NewEvent, Offer, SubValues, TrackingLink, Utm,
};
use crate::storage::traits::{ClickStore, EventStore, OfferStore, TrackingLinkStore};

const MAX_EVENT_TYPE_LEN: usize = 32;
const MAX_TXID_LEN: usize = 128;
const MAX_ID_LEN: usize = 64;
/// 跟踪码碰撞时的重试次数
const TRACKING_CODE_ATTEMPTS: usize = 5;

// ============ Inputs ============

/// 点击的两种入口
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickSource {
    /// `/click?offer=&partner=`
    Direct {
        offer_id: Option<String>,
        partner_id: Option<String>,
    },
    /// `/{code}`
    Code(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickRequest {
    pub source: ClickSource,
    pub subs: SubValues,
    pub utm: Utm,
    pub client: ClientInfo,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClickOutcome {
    pub click: Click,
    pub redirect_url: String,
}

/// `POST /event` 的请求体；revenue 可以是数字或数字字符串
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventInput {
    pub clickid: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub revenue: Option<serde_json::Value>,
    pub currency: Option<String>,
    pub txid: Option<String>,
}

/// 校验通过的事件字段
#[derive(Debug, Clone, PartialEq)]
pub struct ValidEvent {
    pub click_id: String,
    pub event_type: String,
    pub revenue: Option<f64>,
    pub currency: Option<String>,
    pub txid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackingLinkInput {
    pub offer_id: String,
    pub flow_id: Option<String>,
    pub subs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OfferInput {
    pub campaign_id: Option<String>,
    pub name: Option<String>,
    pub landing_url: Option<String>,
}

// ============ Validation ============

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn is_valid_event_type(t: &str) -> bool {
    !t.is_empty()
        && t.len() <= MAX_EVENT_TYPE_LEN
        && t.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

fn parse_revenue(raw: serde_json::Value) -> std::result::Result<Option<f64>, &'static str> {
    let value = match raw {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Number(n) => n.as_f64().ok_or("must be a number")?,
        serde_json::Value::String(s) if s.trim().is_empty() => return Ok(None),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| "must be a number or numeric string")?,
        _ => return Err("must be a number or numeric string"),
    };
    if !value.is_finite() || value < 0.0 {
        return Err("must be a finite, non-negative amount");
    }
    Ok(Some(value))
}

impl EventInput {
    pub fn validate(self) -> Result<ValidEvent> {
        let mut errors = Vec::new();

        let click_id = non_empty(self.clickid).unwrap_or_default();
        if click_id.is_empty() {
            errors.push(FieldError::new("clickid", "is required"));
        } else if !is_valid_click_id(&click_id) {
            errors.push(FieldError::new("clickid", "has an invalid format"));
        }

        let event_type = non_empty(self.event_type).unwrap_or_default();
        if event_type.is_empty() {
            errors.push(FieldError::new("type", "is required"));
        } else if !is_valid_event_type(&event_type) {
            errors.push(FieldError::new(
                "type",
                "must be lowercase letters, digits or '_' (max 32)",
            ));
        }

        let revenue = match self.revenue.map(parse_revenue).transpose() {
            Ok(v) => v.flatten(),
            Err(msg) => {
                errors.push(FieldError::new("revenue", msg));
                None
            }
        };

        let currency = non_empty(self.currency).map(|c| c.to_ascii_uppercase());
        if let Some(ref c) = currency
            && !(c.len() == 3 && c.bytes().all(|b| b.is_ascii_uppercase()))
        {
            errors.push(FieldError::new("currency", "must be a 3-letter ISO 4217 code"));
        }

        let txid = non_empty(self.txid);
        if txid.as_ref().is_some_and(|t| t.len() > MAX_TXID_LEN) {
            errors.push(FieldError::new(
                "txid",
                format!("must be at most {} characters", MAX_TXID_LEN),
            ));
        }

        if !errors.is_empty() {
            return Err(ClicktrailError::invalid_fields("事件校验失败", errors));
        }
        Ok(ValidEvent {
            click_id,
            event_type,
            revenue,
            currency,
            txid,
        })
    }
}

/// 从 referrer 提取主机名
fn referrer_host(referrer: &str) -> Option<String> {
    url::Url::parse(referrer)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

// ============ Service ============

pub struct TrackingService {
    clicks: Arc<dyn ClickStore>,
    events: Arc<dyn EventStore>,
    offers: Arc<dyn OfferStore>,
    links: Arc<dyn TrackingLinkStore>,
    blacklist: Arc<BlacklistFilter>,
    enricher: Arc<dyn ClickEnricher>,
    postbacks: Arc<dyn PostbackSink>,
    default_landing_url: String,
}

/// TrackingService 依赖的存储
pub struct TrackingStores {
    pub clicks: Arc<dyn ClickStore>,
    pub events: Arc<dyn EventStore>,
    pub offers: Arc<dyn OfferStore>,
    pub links: Arc<dyn TrackingLinkStore>,
}

impl TrackingService {
    pub fn new(
        stores: TrackingStores,
        blacklist: Arc<BlacklistFilter>,
        enricher: Arc<dyn ClickEnricher>,
        postbacks: Arc<dyn PostbackSink>,
        default_landing_url: impl Into<String>,
    ) -> Self {
        Self {
            clicks: stores.clicks,
            events: stores.events,
            offers: stores.offers,
            links: stores.links,
            blacklist,
            enricher,
            postbacks,
            default_landing_url: default_landing_url.into(),
        }
    }

    pub async fn ingest_click(&self, req: ClickRequest) -> Result<ClickOutcome> {
        let ClickRequest {
            source,
            subs: request_subs,
            utm,
            client,
            device_id,
        } = req;

        // 1. 解析 partner/offer 对
        let (offer_id, partner_id, flow_id, tracking_code, subs) = match source {
            ClickSource::Direct {
                offer_id,
                partner_id,
            } => {
                let mut errors = Vec::new();
                let offer_id = non_empty(offer_id);
                let partner_id = non_empty(partner_id);
                if offer_id.is_none() {
                    errors.push(FieldError::new("offer", "is required"));
                }
                if partner_id.is_none() {
                    errors.push(FieldError::new("partner", "is required"));
                }
                match (offer_id, partner_id) {
                    (Some(o), Some(p)) => (o, p, None, None, request_subs),
                    _ => return Err(ClicktrailError::invalid_fields("点击参数缺失", errors)),
                }
            }
            ClickSource::Code(code) => {
                let link = self
                    .links
                    .get_tracking_link(&code)
                    .await?
                    .ok_or_else(|| ClicktrailError::not_found(format!("跟踪码不存在: {}", code)))?;
                let mut subs = link.default_subs.clone();
                subs.overlay(&request_subs);
                (
                    link.offer_id,
                    link.partner_id,
                    link.flow_id,
                    Some(link.code),
                    subs,
                )
            }
        };

        // 2. 黑名单
        let referrer_domain = client.referrer.as_deref().and_then(referrer_host);
        let mut candidates: Vec<(BlacklistKind, &str)> = Vec::new();
        if let Some(ip) = client.ip.as_deref() {
            candidates.push((BlacklistKind::Ip, ip));
        }
        if let Some(device) = device_id.as_deref() {
            candidates.push((BlacklistKind::DeviceId, device));
        }
        for (_, value) in subs.iter() {
            candidates.push((BlacklistKind::Subid, value));
        }
        if let Some(ua) = client.user_agent.as_deref() {
            candidates.push((BlacklistKind::UserAgent, ua));
        }
        if let Some(domain) = referrer_domain.as_deref() {
            candidates.push((BlacklistKind::Domain, domain));
        }
        if let Some(hit) = self.blacklist.check(&candidates).await? {
            info!(
                "Click blocked by blacklist entry {} ({} {})",
                hit.id, hit.kind, hit.value
            );
            return Err(ClicktrailError::blocked("请求被拒绝"));
        }

        // 3. offer 必须存在，写入前解析
        let offer = self
            .offers
            .get_offer(&offer_id)
            .await?
            .ok_or_else(|| ClicktrailError::not_found(format!("Offer 不存在: {}", offer_id)))?;

        // 4. 组装点击
        let enrichment = self.enricher.enrich(&client);
        let sub2_parsed = subs.get(2).and_then(parse_sub2);
        let click = Click {
            click_id: generate_click_id(),
            advertiser_id: offer.advertiser_id.clone(),
            partner_id,
            offer_id: offer.id.clone(),
            campaign_id: offer.campaign_id.clone(),
            flow_id,
            tracking_code,
            subs,
            sub2_parsed,
            ip: client.ip,
            user_agent: client.user_agent,
            referrer: client.referrer,
            utm,
            enrichment,
            created_at: Utc::now(),
        };

        // 每个点击至少有一条 open 事件，两者一起提交
        let open_event = NewEvent {
            click_id: click.click_id.clone(),
            event_type: OPEN_EVENT.to_string(),
            revenue: None,
            currency: None,
            txid: None,
            advertiser_id: click.advertiser_id.clone(),
            partner_id: click.partner_id.clone(),
        };
        self.clicks.insert_click(&click, &open_event).await?;

        if let Some(code) = click.tracking_code.as_deref()
            && let Err(e) = self.links.increment_link_clicks(code).await
        {
            warn!("Failed to increment click count for {}: {}", code, e);
        }

        self.postbacks
            .submit(PostbackEvent::from_click(&click, LP_CLICK_EVENT));

        let template = landing_template(offer.landing_url.as_deref(), &self.default_landing_url);
        let redirect_url = render_landing_url(template, &click);

        debug!(
            clickid = %click.click_id,
            offer = %click.offer_id,
            partner = %click.partner_id,
            "Click recorded"
        );
        Ok(ClickOutcome {
            click,
            redirect_url,
        })
    }

    pub async fn ingest_event(&self, input: EventInput) -> Result<Event> {
        let valid = input.validate()?;

        if let Some(hit) = self
            .blacklist
            .check(&[(BlacklistKind::Clickid, valid.click_id.as_str())])
            .await?
        {
            info!(
                "Event blocked by blacklist entry {} ({} {})",
                hit.id, hit.kind, hit.value
            );
            return Err(ClicktrailError::blocked("请求被拒绝"));
        }

        let click = self
            .clicks
            .get_click(&valid.click_id)
            .await?
            .ok_or_else(|| ClicktrailError::not_found(format!("点击不存在: {}", valid.click_id)))?;

        let event = self
            .events
            .insert_event(&NewEvent {
                click_id: click.click_id.clone(),
                event_type: valid.event_type,
                revenue: valid.revenue,
                currency: valid.currency,
                txid: valid.txid,
                advertiser_id: click.advertiser_id.clone(),
                partner_id: click.partner_id.clone(),
            })
            .await?;

        self.postbacks
            .submit(PostbackEvent::from_click(&click, &event.event_type).with_event(&event));

        info!(
            clickid = %event.click_id,
            event_type = %event.event_type,
            "Event recorded: {}",
            event.id
        );
        Ok(event)
    }

    /// 点击及其事件（按时间先后）
    pub async fn get_click_with_events(&self, click_id: &str) -> Result<(Click, Vec<Event>)> {
        let click = self
            .clicks
            .get_click(click_id)
            .await?
            .ok_or_else(|| ClicktrailError::not_found(format!("点击不存在: {}", click_id)))?;
        let events = self.events.events_for_click(click_id).await?;
        Ok((click, events))
    }

    /// 手动补发用的事件；调用方必须是点击的 advertiser 或 partner
    pub async fn manual_event(&self, owner_id: &str, input: EventInput) -> Result<PostbackEvent> {
        let valid = input.validate()?;
        let click = self
            .clicks
            .get_click(&valid.click_id)
            .await?
            .filter(|c| c.advertiser_id == owner_id || c.partner_id == owner_id)
            .ok_or_else(|| ClicktrailError::not_found(format!("点击不存在: {}", valid.click_id)))?;

        let mut event = PostbackEvent::from_click(&click, valid.event_type);
        event.revenue = valid.revenue;
        event.currency = valid.currency;
        event.txid = valid.txid;
        Ok(event)
    }

    /// partner 生成跟踪链接
    pub async fn create_tracking_link(
        &self,
        partner_id: &str,
        input: TrackingLinkInput,
    ) -> Result<TrackingLink> {
        let offer_id = input.offer_id.trim().to_string();
        if offer_id.is_empty() {
            return Err(ClicktrailError::invalid_fields(
                "跟踪链接参数缺失",
                vec![FieldError::new("offer_id", "is required")],
            ));
        }
        if self.offers.get_offer(&offer_id).await?.is_none() {
            return Err(ClicktrailError::not_found(format!("Offer 不存在: {}", offer_id)));
        }

        let unknown: Vec<FieldError> = input
            .subs
            .keys()
            .filter(|k| crate::storage::models::sub_index(k).is_none())
            .map(|k| FieldError::new("subs", format!("unknown sub parameter '{}'", k)))
            .collect();
        if !unknown.is_empty() {
            return Err(ClicktrailError::invalid_fields("跟踪链接参数无效", unknown));
        }

        for _ in 0..TRACKING_CODE_ATTEMPTS {
            let code = generate_tracking_code();
            if self.links.get_tracking_link(&code).await?.is_some() {
                continue;
            }
            let link = TrackingLink {
                code,
                partner_id: partner_id.to_string(),
                offer_id: offer_id.clone(),
                flow_id: non_empty(input.flow_id.clone()),
                default_subs: SubValues::from_map(&input.subs),
                click_count: 0,
                created_at: Utc::now(),
            };
            self.links.insert_tracking_link(&link).await?;
            info!("Tracking link {} created for partner {}", link.code, partner_id);
            return Ok(link);
        }
        Err(ClicktrailError::internal("无法生成唯一的跟踪码"))
    }

    /// advertiser 注册或更新 offer；不属于调用方的 offer 按不存在处理
    pub async fn register_offer(
        &self,
        advertiser_id: &str,
        offer_id: &str,
        input: OfferInput,
    ) -> Result<Offer> {
        if !is_valid_identifier(offer_id) {
            return Err(ClicktrailError::validation(format!(
                "无效的 offer id: {}",
                offer_id
            )));
        }
        let landing_url = non_empty(input.landing_url);
        if let Some(ref url) = landing_url
            && let Err(e) = validate_endpoint(url)
        {
            return Err(ClicktrailError::invalid_fields(
                "Offer 参数无效",
                vec![FieldError::new("landing_url", e)],
            ));
        }

        let existing = self.offers.get_offer(offer_id).await?;
        if existing
            .as_ref()
            .is_some_and(|o| o.advertiser_id != advertiser_id)
        {
            return Err(ClicktrailError::not_found(format!("Offer 不存在: {}", offer_id)));
        }

        let offer = Offer {
            id: offer_id.to_string(),
            advertiser_id: advertiser_id.to_string(),
            campaign_id: non_empty(input.campaign_id),
            name: non_empty(input.name),
            landing_url,
            created_at: existing.map(|o| o.created_at).unwrap_or_else(Utc::now),
        };
        self.offers.upsert_offer(&offer).await?;
        Ok(offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(v: serde_json::Value) -> EventInput {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_valid_event_with_string_revenue() {
        let ev = input(json!({"clickid": "abc123", "type": "deposit", "revenue": "50.00", "currency": "usd"}))
            .validate()
            .unwrap();
        assert_eq!(ev.revenue, Some(50.0));
        assert_eq!(ev.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_numeric_revenue_and_missing_optional() {
        let ev = input(json!({"clickid": "abc123", "type": "lead", "revenue": 0}))
            .validate()
            .unwrap();
        assert_eq!(ev.revenue, Some(0.0));
        assert_eq!(ev.txid, None);
    }

    #[test]
    fn test_invalid_fields_reported() {
        let err = input(json!({"type": "Sale!", "revenue": "-1", "currency": "dollars"}))
            .validate()
            .unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["clickid", "type", "revenue", "currency"]);
    }

    #[test]
    fn test_revenue_rejects_non_numeric() {
        assert!(parse_revenue(json!("abc")).is_err());
        assert!(parse_revenue(json!(true)).is_err());
        assert_eq!(parse_revenue(json!(null)), Ok(None));
        assert_eq!(parse_revenue(json!("")), Ok(None));
    }

    #[test]
    fn test_referrer_host() {
        assert_eq!(
            referrer_host("https://Spam.Example/path?q=1").as_deref(),
            Some("spam.example")
        );
        assert_eq!(referrer_host("not a url"), None);
    }
}
