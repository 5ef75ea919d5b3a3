//! 落地页地址宏替换
//!
//! 支持 `{clickid}`、`{client_id}`（partner）、`{external_id}`（点击 ID）、
//! `{sub1}`..`{sub5}`。值会做百分号编码，未设置的 sub 替换为空串，
//! 其他花括号内容原样保留。

use urlencoding::encode;

use crate::storage::models::Click;

/// 落地页可用的 sub 宏数量
const LANDING_SUB_MACROS: usize = 5;

pub fn render_landing_url(template: &str, click: &Click) -> String {
    let mut url = template
        .replace("{clickid}", &encode(&click.click_id))
        .replace("{client_id}", &encode(&click.partner_id))
        .replace("{external_id}", &encode(&click.click_id));

    for n in 1..=LANDING_SUB_MACROS {
        let placeholder = format!("{{sub{}}}", n);
        if url.contains(&placeholder) {
            let value = click.subs.get(n).unwrap_or_default();
            url = url.replace(&placeholder, &encode(value));
        }
    }
    url
}

/// offer 的落地页，缺失时使用兜底地址
pub fn landing_template<'a>(offer_landing: Option<&'a str>, default_landing: &'a str) -> &'a str {
    offer_landing
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_landing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{Enrichment, SubValues, Utm};
    use chrono::Utc;

    fn click() -> Click {
        let mut subs = SubValues::default();
        subs.set(1, Some("a b".into()));
        subs.set(3, Some("x&y".into()));
        Click {
            click_id: "Ab3-_xyz0123".into(),
            advertiser_id: "adv".into(),
            partner_id: "p42".into(),
            offer_id: "o1".into(),
            campaign_id: None,
            flow_id: None,
            tracking_code: None,
            subs,
            sub2_parsed: None,
            ip: None,
            user_agent: None,
            referrer: None,
            utm: Utm::default(),
            enrichment: Enrichment::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_macros_are_substituted() {
        let url = render_landing_url(
            "https://lp.example/?c={clickid}&p={client_id}&e={external_id}&s1={sub1}&s2={sub2}&s3={sub3}",
            &click(),
        );
        assert_eq!(
            url,
            "https://lp.example/?c=Ab3-_xyz0123&p=p42&e=Ab3-_xyz0123&s1=a%20b&s2=&s3=x%26y"
        );
    }

    #[test]
    fn test_unknown_braces_are_kept() {
        let url = render_landing_url("https://lp.example/{other}?s6={sub6}", &click());
        assert_eq!(url, "https://lp.example/{other}?s6={sub6}");
    }

    #[test]
    fn test_default_landing_fallback() {
        assert_eq!(landing_template(None, "https://d"), "https://d");
        assert_eq!(landing_template(Some("  "), "https://d"), "https://d");
        assert_eq!(landing_template(Some("https://o"), "https://d"), "https://o");
    }
}
