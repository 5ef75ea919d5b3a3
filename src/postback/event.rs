//! 分发器的输入
//!
//! 由点击/事件入口根据触发的 Click（以及 Event）构造，
//! 携带渲染模板所需的全部上下文。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::storage::models::{Click, Event};

/// 点击落地时触发的内部事件类型
pub const LP_CLICK_EVENT: &str = "lp_click";

/// 点击记录时同步写入的事件类型
pub const OPEN_EVENT: &str = "open";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostbackEvent {
    pub event_type: String,
    pub click_id: String,
    pub event_id: Option<String>,
    pub partner_id: String,
    pub offer_id: String,
    pub advertiser_id: Option<String>,
    pub campaign_id: Option<String>,
    pub flow_id: Option<String>,
    pub revenue: Option<f64>,
    pub currency: Option<String>,
    pub txid: Option<String>,
    pub country: Option<String>,
    pub is_bot: bool,
    /// sub/UTM/设备等通用宏上下文
    pub data: BTreeMap<String, String>,
}

impl PostbackEvent {
    /// 以点击为基础构造，sub、UTM、设备信息进入 `data`
    pub fn from_click(click: &Click, event_type: impl Into<String>) -> Self {
        let mut data: BTreeMap<String, String> = click.subs.to_map();

        if let Some(parsed) = &click.sub2_parsed {
            for (k, v) in parsed {
                data.insert(format!("sub2_{}", k), v.clone());
            }
        }
        for (k, v) in click.utm.iter() {
            data.insert(k.to_string(), v.to_string());
        }

        let optional = [
            ("ip", &click.ip),
            ("user_agent", &click.user_agent),
            ("referrer", &click.referrer),
            ("tracking_code", &click.tracking_code),
            ("city", &click.enrichment.city),
            ("device_type", &click.enrichment.device_type),
            ("os", &click.enrichment.os),
            ("browser", &click.enrichment.browser),
        ];
        for (k, v) in optional {
            if let Some(v) = v {
                data.insert(k.to_string(), v.clone());
            }
        }

        PostbackEvent {
            event_type: event_type.into(),
            click_id: click.click_id.clone(),
            event_id: None,
            partner_id: click.partner_id.clone(),
            offer_id: click.offer_id.clone(),
            advertiser_id: Some(click.advertiser_id.clone()),
            campaign_id: click.campaign_id.clone(),
            flow_id: click.flow_id.clone(),
            revenue: None,
            currency: None,
            txid: None,
            country: click.enrichment.country.clone(),
            is_bot: click.enrichment.is_bot,
            data,
        }
    }

    /// 叠加已写入的事件
    pub fn with_event(mut self, event: &Event) -> Self {
        self.event_type = event.event_type.clone();
        self.event_id = Some(event.id.clone());
        self.revenue = event.revenue;
        self.currency = event.currency.clone();
        self.txid = event.txid.clone();
        self
    }

    /// 需要分发的 owner（advertiser 在前，与 partner 相同时只算一次）
    pub fn owners(&self) -> Vec<String> {
        let mut owners = Vec::with_capacity(2);
        if let Some(adv) = self.advertiser_id.as_deref().filter(|s| !s.is_empty()) {
            owners.push(adv.to_string());
        }
        if !self.partner_id.is_empty() && !owners.contains(&self.partner_id) {
            owners.push(self.partner_id.clone());
        }
        owners
    }
}
