//! 点击 ID 与跟踪码生成

use crate::utils::{URL_SAFE_CHARS, generate_random_code, random_string};

/// 点击 ID 长度
pub const CLICK_ID_LEN: usize = 12;

/// 跟踪链接短码长度
pub const TRACKING_CODE_LEN: usize = 8;

/// 生成 12 位 URL 安全的点击 ID
///
/// 64^12 的空间下碰撞概率可以忽略，写入前不做存在性检查。
pub fn generate_click_id() -> String {
    random_string(URL_SAFE_CHARS, CLICK_ID_LEN)
}

pub fn generate_tracking_code() -> String {
    generate_random_code(TRACKING_CODE_LEN)
}

/// 点击 ID 格式检查（用于事件入参）
pub fn is_valid_click_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// 跟踪码格式检查，路由 `/{code}` 兜底匹配时先过滤明显无效的路径
pub fn is_valid_tracking_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= 32 && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_click_id_shape() {
        let id = generate_click_id();
        assert_eq!(id.len(), CLICK_ID_LEN);
        assert!(is_valid_click_id(&id));
    }

    #[test]
    fn test_click_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_click_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_tracking_code_validation() {
        assert!(is_valid_tracking_code(&generate_tracking_code()));
        assert!(!is_valid_tracking_code("favicon.ico"));
        assert!(!is_valid_tracking_code(""));
    }

    #[test]
    fn test_click_id_validation() {
        assert!(is_valid_click_id("abc-DEF_123"));
        assert!(!is_valid_click_id("abc def"));
        assert!(!is_valid_click_id(""));
    }
}
