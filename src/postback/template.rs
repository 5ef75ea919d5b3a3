//! 宏模板渲染
//!
//! `{{ key }}` 按上下文替换，键名两侧空白忽略；上下文中没有的键原样保留。
//! 渲染是纯函数，不做任何 IO。

use std::collections::BTreeMap;

use super::event::PostbackEvent;

/// 模板上下文
pub type Context = BTreeMap<String, String>;

/// 固定宏；事件上缺失时渲染为空串
pub const KNOWN_MACROS: &[&str] = &[
    "clickid",
    "status",
    "event_type",
    "event_id",
    "revenue",
    "currency",
    "country_iso",
    "offer_id",
    "partner_id",
    "advertiser_id",
    "campaign_id",
    "flow_id",
    "txid",
];

/// 构造渲染上下文：事件 data 在下，固定宏覆盖在上
pub fn build_context(event: &PostbackEvent, status: &str) -> Context {
    let mut ctx = event.data.clone();
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    let known = [
        ("clickid", event.click_id.clone()),
        ("status", status.to_string()),
        ("event_type", event.event_type.clone()),
        ("event_id", opt(&event.event_id)),
        (
            "revenue",
            event.revenue.map(|r| format!("{:.2}", r)).unwrap_or_default(),
        ),
        ("currency", opt(&event.currency)),
        ("country_iso", opt(&event.country)),
        ("offer_id", event.offer_id.clone()),
        ("partner_id", event.partner_id.clone()),
        ("advertiser_id", opt(&event.advertiser_id)),
        ("campaign_id", opt(&event.campaign_id)),
        ("flow_id", opt(&event.flow_id)),
        ("txid", opt(&event.txid)),
    ];
    for (k, v) in known {
        ctx.insert(k.to_string(), v);
    }
    ctx
}

/// 渲染单个模板字符串
pub fn render_str(template: &str, ctx: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            // 没有闭合，剩余部分原样输出
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after_open[..end].trim();
        match ctx.get(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

/// 渲染参数模板，键不变，值逐个渲染
pub fn render(template: &BTreeMap<String, String>, ctx: &Context) -> BTreeMap<String, String> {
    template
        .iter()
        .map(|(name, tpl)| (name.clone(), render_str(tpl, ctx)))
        .collect()
}
