//! 出站请求构造
//!
//! profile + 事件 → 方法、URL、body、header。纯函数，dry-run 和真实投递共用。

use std::collections::BTreeMap;

use serde::Serialize;
use url::Url;
use urlencoding::encode;

use super::event::PostbackEvent;
use super::signing::{DEFAULT_SIGNATURE_PARAM, sign};
use super::template::{build_context, render, render_str};
use crate::storage::models::{HttpMethod, ProfileDraft};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// 内部事件类型映射到 tracker 的状态，没有映射时原样透传
pub fn map_status(settings: &ProfileDraft, event_type: &str) -> String {
    settings
        .status_map
        .get(event_type)
        .filter(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| event_type.to_string())
}

/// 只接受 http/https 的绝对地址
pub fn validate_endpoint(endpoint: &str) -> Result<Url, String> {
    let url = Url::parse(endpoint.trim()).map_err(|e| format!("invalid endpoint url: {}", e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err("endpoint url has no host".to_string()),
        other => Err(format!("unsupported endpoint scheme: {}", other)),
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// 默认签名内容：按参数名排序的 `k=v&k=v`
fn canonical_payload(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// 追加到已有查询串之后；fragment 保持在最后
fn append_query(url: &mut Url, pairs: &[(String, String)], url_encode: bool) {
    if pairs.is_empty() {
        return;
    }
    let added = pairs
        .iter()
        .map(|(k, v)| {
            if url_encode {
                format!("{}={}", encode(k), encode(v))
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    let query = match url.query().map(|q| q.trim_end_matches('&')).filter(|q| !q.is_empty()) {
        Some(existing) => format!("{}&{}", existing, added),
        None => added,
    };
    url.set_query(Some(&query));
}

/// 渲染 profile 的请求
///
/// - GET：渲染后的参数和 query 鉴权对放进查询串
/// - POST：参数序列化为 JSON body；query 鉴权对仍在 URL 上
/// - header 鉴权对两种方法都会带上
pub fn build_request(
    settings: &ProfileDraft,
    event: &PostbackEvent,
) -> Result<PreparedRequest, String> {
    let mut url = validate_endpoint(&settings.endpoint_url)?;

    let status = map_status(settings, &event.event_type);
    let ctx = build_context(event, &status);
    let mut params = render(&settings.params_template, &ctx);

    if settings.hmac_enabled {
        let secret = non_empty(&settings.hmac_secret)
            .ok_or_else(|| "hmac enabled but hmac_secret is empty".to_string())?;
        let payload = match non_empty(&settings.hmac_payload_tpl) {
            Some(tpl) => render_str(tpl, &ctx),
            None => canonical_payload(&params),
        };
        let signature = sign(secret, &payload, settings.hmac_encoding)?;
        let name = non_empty(&settings.hmac_param_name).unwrap_or(DEFAULT_SIGNATURE_PARAM);
        params.insert(name.to_string(), signature);
    }

    let auth_query = non_empty(&settings.auth_query_key)
        .map(|k| (k.to_string(), settings.auth_query_val.clone().unwrap_or_default()));

    let mut headers = Vec::new();
    let body = match settings.method {
        HttpMethod::Get => {
            let mut pairs: Vec<(String, String)> = params.into_iter().collect();
            pairs.extend(auth_query);
            append_query(&mut url, &pairs, settings.url_encode);
            None
        }
        HttpMethod::Post => {
            let pairs: Vec<(String, String)> = auth_query.into_iter().collect();
            append_query(&mut url, &pairs, settings.url_encode);
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
            Some(serde_json::to_string(&params).map_err(|e| e.to_string())?)
        }
    };

    if let Some(key) = non_empty(&settings.auth_header_key) {
        headers.push((
            key.to_string(),
            settings.auth_header_val.clone().unwrap_or_default(),
        ));
    }

    Ok(PreparedRequest {
        method: settings.method,
        url: url.into(),
        body,
        headers,
    })
}
