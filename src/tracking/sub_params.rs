//! sub2 结构化参数解析
//!
//! 格式：`key-value|key-value`，例如 `geo-US|dev-mobile`。
//! 只在第一个 `-` 处切分，值中可以再出现 `-`。

use std::collections::BTreeMap;

/// 解析 sub2；任何一段不合法都返回 None，调用方只保留原始字符串
pub fn parse_sub2(raw: &str) -> Option<BTreeMap<String, String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut map = BTreeMap::new();
    for part in raw.split('|') {
        let (key, value) = part.split_once('-')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        map.insert(key.to_string(), value.trim().to_string());
    }
    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let map = parse_sub2("geo-US|dev-mobile").unwrap();
        assert_eq!(map.get("geo").map(String::as_str), Some("US"));
        assert_eq!(map.get("dev").map(String::as_str), Some("mobile"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_value_may_contain_dash() {
        let map = parse_sub2("lp-summer-sale").unwrap();
        assert_eq!(map.get("lp").map(String::as_str), Some("summer-sale"));
    }

    #[test]
    fn test_malformed_is_none() {
        assert_eq!(parse_sub2("malformed"), None);
        assert_eq!(parse_sub2("geo-US|broken"), None);
        assert_eq!(parse_sub2("-US"), None);
        assert_eq!(parse_sub2(""), None);
    }
}
