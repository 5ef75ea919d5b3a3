//! 点击信息补全
//!
//! 引擎只保存补全结果，不关心来源。默认实现 `HeaderEnricher` 用 woothee
//! 解析 User-Agent，国家代码取自上游（CDN/网关）写入的 header。

use woothee::parser::Parser;

use crate::storage::models::Enrichment;

/// 访客请求中与补全相关的信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// 上游解析好的 ISO 国家代码
    pub country_hint: Option<String>,
}

pub trait ClickEnricher: Send + Sync {
    fn enrich(&self, client: &ClientInfo) -> Enrichment;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEnricher;

impl HeaderEnricher {
    pub fn new() -> Self {
        Self
    }
}

/// 两位字母的国家代码；Cloudflare 的 XX（未知）和 T1（Tor）视为未知
fn normalize_country(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphabetic()) && code != "XX" {
        Some(code)
    } else {
        None
    }
}

fn known(value: &str) -> Option<String> {
    (!value.is_empty() && value != "UNKNOWN").then(|| value.to_string())
}

impl ClickEnricher for HeaderEnricher {
    fn enrich(&self, client: &ClientInfo) -> Enrichment {
        let mut enrichment = Enrichment {
            country: client.country_hint.as_deref().and_then(normalize_country),
            ..Enrichment::default()
        };

        if let Some(ua) = client.user_agent.as_deref().filter(|ua| !ua.is_empty())
            && let Some(result) = Parser::new().parse(ua)
        {
            enrichment.browser = known(&result.name);
            enrichment.os = known(&result.os);
            enrichment.device_type = known(&result.category);
            enrichment.is_bot = result.category == "crawler";
        }

        enrichment
    }
}
