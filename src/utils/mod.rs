pub mod ip;

/// URL 安全字符集（A-Z a-z 0-9 - _）
pub const URL_SAFE_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// 字母数字字符集
pub const ALPHANUMERIC_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 从给定字符集中随机生成指定长度的字符串
pub fn random_string(charset: &[u8], length: usize) -> String {
    use std::iter;

    iter::repeat_with(|| charset[rand::random_range(0..charset.len())] as char)
        .take(length)
        .collect()
}

/// 随机字母数字串（跟踪链接短码）
pub fn generate_random_code(length: usize) -> String {
    random_string(ALPHANUMERIC_CHARS, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_code() {
        let code = generate_random_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_string_uses_charset() {
        let s = random_string(b"ab", 64);
        assert!(s.chars().all(|c| c == 'a' || c == 'b'));
    }
}
