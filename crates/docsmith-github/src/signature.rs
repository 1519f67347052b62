//! Webhook signature verification.
//!
//! GitHub signs each delivery with `X-Hub-Signature-256: sha256=<hex>` where
//! `<hex>` is the HMAC-SHA-256 of the raw body under the shared secret. The
//! comparison is constant-time.

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The header value this secret would produce for `body`, including the
/// `sha256=` prefix.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Whether `header_value` is a valid signature for `body` under `secret`.
pub fn verify_webhook_signature(body: &[u8], header_value: &str, secret: &str) -> bool {
    let Some(provided) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_correctly_signed_body() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let header = sign_payload("s3cret", body);
        assert!(verify_webhook_signature(body, &header, "s3cret"));
    }

    #[test]
    fn rejects_wrong_secret_or_tampered_body() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let header = sign_payload("s3cret", body);
        assert!(!verify_webhook_signature(body, &header, "other-secret"));
        assert!(!verify_webhook_signature(b"tampered", &header, "s3cret"));
    }

    #[test]
    fn rejects_malformed_headers() {
        let body = b"{}";
        assert!(!verify_webhook_signature(body, "deadbeef", "s3cret"));
        assert!(!verify_webhook_signature(body, "sha1=deadbeef", "s3cret"));
        assert!(!verify_webhook_signature(body, "sha256=deadbeef", "s3cret"));
        assert!(!verify_webhook_signature(body, "", "s3cret"));
    }
}
