//! HMAC-SHA256 request signer (C4). Grounded on the teacher's
//! `api/webhooks.rs` (`Hmac<Sha256>`, `subtle::ConstantTimeEq`,
//! `hex::encode`) — same primitives, applied to the outbound dispatch
//! instead of an inbound webhook verification.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub struct SignedHeaders {
    pub timestamp: String,
    pub signature: String,
}

/// Computes `HMAC-SHA256(key, "<unixSeconds>.<body-or-empty>")` (spec §6).
pub fn sign(key: &[u8], timestamp: DateTime<Utc>, body: &[u8]) -> SignedHeaders {
    let ts = timestamp.timestamp().to_string();
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(body);
    let sig_hex = hex::encode(mac.finalize().into_bytes());
    SignedHeaders {
        timestamp: ts,
        signature: format!("sha256={sig_hex}"),
    }
}

/// Verifies a `sha256=<hex>`-formatted signature in constant time (spec §6,
/// P7). `signature` is the raw header value, prefix included.
pub fn verify(key: &[u8], timestamp_secs: &str, body: &[u8], signature: &str) -> bool {
    let sig_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(timestamp_secs.as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    expected.as_bytes().ct_eq(sig_hex.as_bytes()).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    /// P7: sign then verify round-trips; any one-bit flip fails.
    #[test]
    fn sign_then_verify_round_trips() {
        let key = b"secret-key";
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let body = br#"{"hello":"world"}"#;

        let signed = sign(key, ts, body);
        assert!(verify(key, &signed.timestamp, body, &signed.signature));
    }

    #[test]
    fn bit_flip_in_body_fails_verification() {
        let key = b"secret-key";
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let body = br#"{"hello":"world"}"#;
        let signed = sign(key, ts, body);

        let mut flipped = body.to_vec();
        flipped[0] ^= 0x01;
        assert!(!verify(key, &signed.timestamp, &flipped, &signed.signature));
    }

    #[test]
    fn bit_flip_in_signature_fails_verification() {
        let key = b"secret-key";
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let body = br#"{"hello":"world"}"#;
        let mut signed = sign(key, ts, body);

        let mut bytes = signed.signature.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        signed.signature = String::from_utf8(bytes).unwrap();

        assert!(!verify(key, &signed.timestamp, body, &signed.signature));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let body = b"payload";
        let signed = sign(b"key-a", ts, body);
        assert!(!verify(b"key-b", &signed.timestamp, body, &signed.signature));
    }
}
