//! Sea-ORM Model 与领域模型之间的转换
//!
//! JSON 列（sub2_parsed、status_map 等）在这里序列化/反序列化；
//! 自增主键转成十进制字符串。

use std::collections::BTreeMap;

use sea_orm::ActiveValue::{NotSet, Set};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::storage::models::{
    BlacklistEntry, BlacklistKind, Click, DeliveryRecord, Enrichment, Event, NewDelivery, NewEvent,
    Offer, PostbackProfile, ProfileDraft, SubValues, TrackingLink, Utm,
};
use migration::entities::{
    blacklist_entry, click, event, offer, postback_delivery, postback_profile, tracking_link,
};

/// 解析 JSON 列，损坏的数据按默认值处理并告警
fn json_or_default<T: DeserializeOwned + Default>(column: &str, raw: Option<&str>) -> T {
    match raw {
        None => T::default(),
        Some(s) if s.is_empty() => T::default(),
        Some(s) => serde_json::from_str(s).unwrap_or_else(|e| {
            warn!("Corrupted JSON in column {}: {}", column, e);
            T::default()
        }),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// 空列表存 NULL
fn list_to_json(list: &[String]) -> Option<String> {
    (!list.is_empty()).then(|| to_json(&list))
}

/// 字符串 id 转数据库主键；非数字 id 视为不存在
pub fn parse_id(id: &str) -> Option<i64> {
    id.parse::<i64>().ok()
}

pub fn model_to_offer(model: offer::Model) -> Offer {
    Offer {
        id: model.id,
        advertiser_id: model.advertiser_id,
        campaign_id: model.campaign_id,
        name: model.name,
        landing_url: model.landing_url,
        created_at: model.created_at,
    }
}

pub fn offer_to_active_model(offer: &Offer) -> offer::ActiveModel {
    offer::ActiveModel {
        id: Set(offer.id.clone()),
        advertiser_id: Set(offer.advertiser_id.clone()),
        campaign_id: Set(offer.campaign_id.clone()),
        name: Set(offer.name.clone()),
        landing_url: Set(offer.landing_url.clone()),
        created_at: Set(offer.created_at),
    }
}

pub fn model_to_tracking_link(model: tracking_link::Model) -> TrackingLink {
    let subs: BTreeMap<String, String> =
        json_or_default("tracking_links.default_subs", model.default_subs.as_deref());
    TrackingLink {
        code: model.code,
        partner_id: model.partner_id,
        offer_id: model.offer_id,
        flow_id: model.flow_id,
        default_subs: SubValues::from_map(&subs),
        click_count: model.click_count.max(0),
        created_at: model.created_at,
    }
}

pub fn tracking_link_to_active_model(link: &TrackingLink) -> tracking_link::ActiveModel {
    let subs = link.default_subs.to_map();
    tracking_link::ActiveModel {
        code: Set(link.code.clone()),
        partner_id: Set(link.partner_id.clone()),
        offer_id: Set(link.offer_id.clone()),
        flow_id: Set(link.flow_id.clone()),
        default_subs: Set((!subs.is_empty()).then(|| to_json(&subs))),
        click_count: Set(link.click_count),
        created_at: Set(link.created_at),
    }
}

pub fn model_to_click(model: click::Model) -> Click {
    let sub2_parsed = model
        .sub2_parsed
        .as_deref()
        .and_then(|raw| serde_json::from_str::<BTreeMap<String, String>>(raw).ok());

    let subs = SubValues::from_array([
        model.sub1,
        model.sub2,
        model.sub3,
        model.sub4,
        model.sub5,
        model.sub6,
        model.sub7,
        model.sub8,
        model.sub9,
        model.sub10,
        model.sub11,
        model.sub12,
        model.sub13,
        model.sub14,
        model.sub15,
        model.sub16,
    ]);

    Click {
        click_id: model.click_id,
        advertiser_id: model.advertiser_id,
        partner_id: model.partner_id,
        offer_id: model.offer_id,
        campaign_id: model.campaign_id,
        flow_id: model.flow_id,
        tracking_code: model.tracking_code,
        subs,
        sub2_parsed,
        ip: model.ip,
        user_agent: model.user_agent,
        referrer: model.referrer,
        utm: Utm {
            source: model.utm_source,
            medium: model.utm_medium,
            campaign: model.utm_campaign,
            term: model.utm_term,
            content: model.utm_content,
        },
        enrichment: Enrichment {
            country: model.country,
            city: model.city,
            device_type: model.device_type,
            os: model.os,
            browser: model.browser,
            is_bot: model.is_bot,
        },
        created_at: model.created_at,
    }
}

pub fn click_to_active_model(c: &Click) -> click::ActiveModel {
    let [
        sub1,
        sub2,
        sub3,
        sub4,
        sub5,
        sub6,
        sub7,
        sub8,
        sub9,
        sub10,
        sub11,
        sub12,
        sub13,
        sub14,
        sub15,
        sub16,
    ] = c.subs.clone().into_array();

    click::ActiveModel {
        click_id: Set(c.click_id.clone()),
        advertiser_id: Set(c.advertiser_id.clone()),
        partner_id: Set(c.partner_id.clone()),
        offer_id: Set(c.offer_id.clone()),
        campaign_id: Set(c.campaign_id.clone()),
        flow_id: Set(c.flow_id.clone()),
        tracking_code: Set(c.tracking_code.clone()),
        sub1: Set(sub1),
        sub2: Set(sub2),
        sub3: Set(sub3),
        sub4: Set(sub4),
        sub5: Set(sub5),
        sub6: Set(sub6),
        sub7: Set(sub7),
        sub8: Set(sub8),
        sub9: Set(sub9),
        sub10: Set(sub10),
        sub11: Set(sub11),
        sub12: Set(sub12),
        sub13: Set(sub13),
        sub14: Set(sub14),
        sub15: Set(sub15),
        sub16: Set(sub16),
        sub2_parsed: Set(c.sub2_parsed.as_ref().map(to_json)),
        ip: Set(c.ip.clone()),
        user_agent: Set(c.user_agent.clone()),
        referrer: Set(c.referrer.clone()),
        utm_source: Set(c.utm.source.clone()),
        utm_medium: Set(c.utm.medium.clone()),
        utm_campaign: Set(c.utm.campaign.clone()),
        utm_term: Set(c.utm.term.clone()),
        utm_content: Set(c.utm.content.clone()),
        country: Set(c.enrichment.country.clone()),
        city: Set(c.enrichment.city.clone()),
        device_type: Set(c.enrichment.device_type.clone()),
        os: Set(c.enrichment.os.clone()),
        browser: Set(c.enrichment.browser.clone()),
        is_bot: Set(c.enrichment.is_bot),
        created_at: Set(c.created_at),
    }
}

pub fn model_to_event(model: event::Model) -> Event {
    Event {
        id: model.id.to_string(),
        click_id: model.click_id,
        event_type: model.event_type,
        revenue: model.revenue,
        currency: model.currency,
        txid: model.txid,
        advertiser_id: model.advertiser_id,
        partner_id: model.partner_id,
        created_at: model.created_at,
    }
}

pub fn new_event_to_active_model(
    e: &NewEvent,
    created_at: chrono::DateTime<chrono::Utc>,
) -> event::ActiveModel {
    event::ActiveModel {
        id: NotSet,
        click_id: Set(e.click_id.clone()),
        event_type: Set(e.event_type.clone()),
        revenue: Set(e.revenue),
        currency: Set(e.currency.clone()),
        txid: Set(e.txid.clone()),
        advertiser_id: Set(e.advertiser_id.clone()),
        partner_id: Set(e.partner_id.clone()),
        created_at: Set(created_at),
    }
}

pub fn model_to_profile(model: postback_profile::Model) -> PostbackProfile {
    let settings = ProfileDraft {
        name: model.name,
        scope_type: model.scope_type.parse().unwrap_or_default(),
        scope_id: model.scope_id,
        priority: model.priority,
        enabled: model.enabled,
        endpoint_url: model.endpoint_url,
        method: model.method.parse().unwrap_or_default(),
        id_param: model.id_param.parse().unwrap_or_default(),
        auth_query_key: model.auth_query_key,
        auth_query_val: model.auth_query_val,
        auth_header_key: model.auth_header_key,
        auth_header_val: model.auth_header_val,
        hmac_enabled: model.hmac_enabled,
        hmac_secret: model.hmac_secret,
        hmac_payload_tpl: model.hmac_payload_tpl,
        hmac_param_name: model.hmac_param_name,
        hmac_encoding: model.hmac_encoding.parse().unwrap_or_default(),
        status_map: json_or_default("postback_profiles.status_map", Some(&model.status_map)),
        params_template: json_or_default(
            "postback_profiles.params_template",
            Some(&model.params_template),
        ),
        url_encode: model.url_encode,
        retries: model.retries.max(0) as u32,
        timeout_ms: model.timeout_ms.max(0) as u64,
        backoff_base_sec: model.backoff_base_sec.max(0) as u64,
        filter_revenue_gt0: model.filter_revenue_gt0,
        filter_country_whitelist: json_or_default(
            "postback_profiles.filter_country_whitelist",
            model.filter_country_whitelist.as_deref(),
        ),
        filter_country_blacklist: json_or_default(
            "postback_profiles.filter_country_blacklist",
            model.filter_country_blacklist.as_deref(),
        ),
        filter_exclude_bots: model.filter_exclude_bots,
    };

    PostbackProfile {
        id: model.id.to_string(),
        owner_id: model.owner_id,
        settings,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// 写入 draft 的全部可写字段；id/owner/created_at 由调用方决定
pub fn draft_to_active_model(
    draft: &ProfileDraft,
    now: chrono::DateTime<chrono::Utc>,
) -> postback_profile::ActiveModel {
    postback_profile::ActiveModel {
        id: NotSet,
        owner_id: NotSet,
        name: Set(draft.name.clone()),
        scope_type: Set(draft.scope_type.as_ref().to_string()),
        scope_id: Set(draft.scope_id.clone()),
        priority: Set(draft.priority),
        enabled: Set(draft.enabled),
        endpoint_url: Set(draft.endpoint_url.clone()),
        method: Set(draft.method.as_ref().to_string()),
        id_param: Set(draft.id_param.as_ref().to_string()),
        auth_query_key: Set(draft.auth_query_key.clone()),
        auth_query_val: Set(draft.auth_query_val.clone()),
        auth_header_key: Set(draft.auth_header_key.clone()),
        auth_header_val: Set(draft.auth_header_val.clone()),
        hmac_enabled: Set(draft.hmac_enabled),
        hmac_secret: Set(draft.hmac_secret.clone()),
        hmac_payload_tpl: Set(draft.hmac_payload_tpl.clone()),
        hmac_param_name: Set(draft.hmac_param_name.clone()),
        hmac_encoding: Set(draft.hmac_encoding.as_ref().to_string()),
        status_map: Set(to_json(&draft.status_map)),
        params_template: Set(to_json(&draft.params_template)),
        url_encode: Set(draft.url_encode),
        retries: Set(draft.retries.min(i32::MAX as u32) as i32),
        timeout_ms: Set(draft.timeout_ms.min(i64::MAX as u64) as i64),
        backoff_base_sec: Set(draft.backoff_base_sec.min(i64::MAX as u64) as i64),
        filter_revenue_gt0: Set(draft.filter_revenue_gt0),
        filter_country_whitelist: Set(list_to_json(&draft.filter_country_whitelist)),
        filter_country_blacklist: Set(list_to_json(&draft.filter_country_blacklist)),
        filter_exclude_bots: Set(draft.filter_exclude_bots),
        created_at: NotSet,
        updated_at: Set(now),
    }
}

pub fn model_to_delivery(model: postback_delivery::Model) -> DeliveryRecord {
    DeliveryRecord {
        id: model.id.to_string(),
        attempt: NewDelivery {
            profile_id: model.profile_id.to_string(),
            event_id: model.event_id,
            click_id: model.click_id,
            event_type: model.event_type,
            attempt: model.attempt.max(0) as u32,
            max_attempts: model.max_attempts.max(0) as u32,
            request_method: model.request_method,
            request_url: model.request_url,
            request_body: model.request_body,
            response_code: model.response_code.and_then(|c| u16::try_from(c).ok()),
            response_body: model.response_body,
            error: model.error,
            duration_ms: model.duration_ms.max(0) as u64,
        },
        created_at: model.created_at,
    }
}

/// profile_id 不是数字时返回 None（只可能来自内存中的临时 profile）
pub fn delivery_to_active_model(
    d: &NewDelivery,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Option<postback_delivery::ActiveModel> {
    let profile_id = parse_id(&d.profile_id)?;
    Some(postback_delivery::ActiveModel {
        id: NotSet,
        profile_id: Set(profile_id),
        event_id: Set(d.event_id.clone()),
        click_id: Set(d.click_id.clone()),
        event_type: Set(d.event_type.clone()),
        attempt: Set(d.attempt as i32),
        max_attempts: Set(d.max_attempts as i32),
        request_method: Set(d.request_method.clone()),
        request_url: Set(d.request_url.clone()),
        request_body: Set(d.request_body.clone()),
        response_code: Set(d.response_code.map(i32::from)),
        response_body: Set(d.response_body.clone()),
        error: Set(d.error.clone()),
        duration_ms: Set(d.duration_ms.min(i64::MAX as u64) as i64),
        created_at: Set(created_at),
    })
}

/// 无法识别的 kind 返回 None（不会由本服务写入）
pub fn model_to_blacklist_entry(model: blacklist_entry::Model) -> Option<BlacklistEntry> {
    let kind: BlacklistKind = model.kind.parse().ok()?;
    Some(BlacklistEntry {
        id: model.id.to_string(),
        kind,
        value: model.value,
        reason: model.reason,
        expires_at: model.expires_at,
        created_at: model.created_at,
    })
}
