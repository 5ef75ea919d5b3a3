//! HMAC-SHA256 签名

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::storage::models::HmacEncoding;

type HmacSha256 = Hmac<Sha256>;

/// 签名参数的默认名称
pub const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// 对已渲染的 payload 签名
///
/// HMAC 接受任意长度的 key，这里不会失败；保留 Result 以便调用方统一记录错误。
pub fn sign(secret: &str, payload: &str, encoding: HmacEncoding) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("invalid HMAC key: {}", e))?;
    mac.update(payload.as_bytes());
    let digest = mac.finalize().into_bytes();

    Ok(match encoding {
        HmacEncoding::Hex => hex::encode(digest),
        HmacEncoding::Base64 => STANDARD.encode(digest),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4231 test case 2
    const KEY: &str = "Jefe";
    const DATA: &str = "what do ya want for nothing?";
    const HEX: &str = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";

    #[test]
    fn test_hex_digest() {
        assert_eq!(sign(KEY, DATA, HmacEncoding::Hex).unwrap(), HEX);
    }

    #[test]
    fn test_base64_digest() {
        let expected = STANDARD.encode(hex::decode(HEX).unwrap());
        assert_eq!(sign(KEY, DATA, HmacEncoding::Base64).unwrap(), expected);
    }

    #[test]
    fn test_empty_secret_is_allowed() {
        assert_eq!(sign("", "x", HmacEncoding::Hex).unwrap().len(), 64);
    }
}
