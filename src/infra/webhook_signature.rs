use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a `t=<unix-ts>,v1=<hex>` signature header over the raw body.
/// The signed payload is `"{t}.{body}"`. Both providers use this scheme.
/// Must be called before any parsing of the body; every failure mode maps to
/// `SignatureInvalid` so callers cannot leak detail to the sender.
pub fn verify_signature(secret: &str, header: &str, body: &[u8]) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    let (timestamp, signature) = match (timestamp, signature) {
        (Some(t), Some(s)) => (t, s),
        _ => return Err(AppError::SignatureInvalid),
    };

    let expected = hex::decode(signature).map_err(|_| AppError::SignatureInvalid)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::SignatureInvalid)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    // verify_slice is constant-time.
    mac.verify_slice(&expected).map_err(|_| AppError::SignatureInvalid)
}

/// Produces a header value `verify_signature` accepts; used by the local
/// webhook simulators and the test harness.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_signature_verifies() {
        let body = br#"{"event":"invitee.created"}"#;
        let header = sign("secret-1", 1717320000, body);
        assert!(verify_signature("secret-1", &header, body).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"payload";
        let header = sign("secret-1", 1717320000, body);
        assert!(matches!(
            verify_signature("secret-2", &header, body),
            Err(AppError::SignatureInvalid)
        ));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign("secret-1", 1717320000, b"payload");
        assert!(matches!(
            verify_signature("secret-1", &header, b"other"),
            Err(AppError::SignatureInvalid)
        ));
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(matches!(
            verify_signature("secret-1", "v1=deadbeef", b"payload"),
            Err(AppError::SignatureInvalid)
        ));
        assert!(matches!(
            verify_signature("secret-1", "garbage", b"payload"),
            Err(AppError::SignatureInvalid)
        ));
    }
}
