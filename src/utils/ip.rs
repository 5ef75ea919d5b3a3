//! IP 地址处理工具
//!
//! - 可信代理判断（单 IP 或 CIDR）
//! - 从请求中提取访客 IP

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 解析 `1.2.3.4`、`1.2.3.4:80` 或 `[::1]:80`
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| raw.parse::<IpAddr>())
        .ok()
}

/// 是否为合法的 IP 或 CIDR
pub fn is_ip_or_cidr(value: &str) -> bool {
    match value.split_once('/') {
        Some((network, prefix)) => {
            let Ok(prefix) = prefix.parse::<u8>() else {
                return false;
            };
            match network.parse::<IpAddr>() {
                Ok(IpAddr::V4(_)) => prefix <= 32,
                Ok(IpAddr::V6(_)) => prefix <= 128,
                Err(_) => false,
            }
        }
        None => value.parse::<IpAddr>().is_ok(),
    }
}

/// `ip` 是否等于 `pattern`（单 IP）或落在 `pattern`（CIDR）内
pub fn ip_matches(ip: &IpAddr, pattern: &str) -> bool {
    if pattern.contains('/') {
        ip_in_cidr(ip, pattern)
    } else {
        pattern.parse::<IpAddr>().is_ok_and(|p| p == *ip)
    }
}

/// 检查 IP 是否在可信代理列表中
pub fn is_trusted_proxy(ip: &str, trusted_proxies: &[String]) -> bool {
    let Some(ip_addr) = parse_ip(ip) else {
        return false;
    };
    trusted_proxies.iter().any(|proxy| ip_matches(&ip_addr, proxy))
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(prefix_len) = prefix_len.parse::<u32>() else {
        return false;
    };
    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix_len <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0);
            (u32::from(*ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix_len <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix_len).unwrap_or(0);
            (u128::from(*ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}

/// X-Forwarded-For 的第一个地址，其次 X-Real-IP
pub fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}

/// 提取访客 IP
///
/// 只有连接来自 `trusted_proxies` 时才信任转发头，否则使用连接地址，
/// 防止直连访客伪造 X-Forwarded-For 绕过黑名单。
pub fn extract_client_ip(req: &HttpRequest, trusted_proxies: &[String]) -> Option<String> {
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());

    match peer {
        Some(peer_ip) if is_trusted_proxy(&peer_ip, trusted_proxies) => {
            let real_ip = forwarded_ip(req.headers()).unwrap_or_else(|| peer_ip.clone());
            debug!("Trusted proxy {} -> {}", peer_ip, real_ip);
            Some(real_ip)
        }
        Some(peer_ip) => Some(peer_ip),
        // 测试请求或 Unix socket 没有 peer 地址
        None if !trusted_proxies.is_empty() => forwarded_ip(req.headers()),
        None => None,
    }
}
