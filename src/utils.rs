//! Webhook signature verification.
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw request body and
//! sends the result as `X-Hub-Signature-256: sha256=<hex>`. Verification must
//! run on the exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes the raw HMAC-SHA256 of `body` keyed by `secret`.
pub fn compute_signature(body: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a raw signature as a header value, `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(signature))
}

/// Returns `true` only if `signature_header` is exactly `sha256=<hex>` as
/// GitHub formats it (lowercase hex) and the digest matches the HMAC of
/// `body` under `secret`.
///
/// Missing prefix, uppercase or malformed hex, or a mismatch all yield
/// `false`; this never panics. The digest comparison is constant-time
/// (delegated to `Mac::verify_slice`).
pub fn verify_signature(body: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    // Only the canonical encoding is accepted, so the header text maps to
    // exactly one digest.
    if !hex_sig.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return false;
    }
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sign(body: &[u8], secret: &[u8]) -> String {
        format_signature_header(&compute_signature(body, secret))
    }

    #[test]
    fn accepts_github_documentation_vector() {
        // https://docs.github.com/en/webhooks/using-webhooks/validating-webhook-deliveries
        let header = "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";
        assert!(verify_signature(
            b"Hello, World!",
            header,
            b"It's a Secret to Everybody"
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = sign(b"payload", b"right");
        assert!(verify_signature(b"payload", &header, b"right"));
        assert!(!verify_signature(b"payload", &header, b"wrong"));
    }

    #[test]
    fn rejects_malformed_headers() {
        let body = b"{}";
        let secret = b"secret";
        let hex_only = hex::encode(compute_signature(body, secret));

        assert!(!verify_signature(body, "", secret));
        assert!(!verify_signature(body, "sha256=", secret));
        assert!(!verify_signature(body, "sha256=zz", secret));
        assert!(!verify_signature(body, "sha1=abc123", secret));
        assert!(!verify_signature(body, &hex_only, secret));
        assert!(!verify_signature(body, &format!("SHA256={hex_only}"), secret));
    }

    #[test]
    fn non_canonical_hex_is_rejected() {
        let body = b"{\"action\":\"opened\"}";
        let lower = hex::encode(compute_signature(body, b"s"));
        let upper = format!("sha256={}", lower.to_ascii_uppercase());
        assert!(!verify_signature(body, &upper, b"s"));

        let first_letter = lower.find(|c: char| c.is_ascii_alphabetic()).unwrap();
        let mut mixed = lower.clone();
        mixed.replace_range(
            first_letter..first_letter + 1,
            &lower[first_letter..first_letter + 1].to_ascii_uppercase(),
        );
        assert!(!verify_signature(body, &format!("sha256={mixed}"), b"s"));
        assert!(!verify_signature(body, &format!("sha256={lower} "), b"s"));
    }

    #[test]
    fn empty_body_and_empty_secret_still_verify() {
        let header = sign(b"", b"");
        assert!(verify_signature(b"", &header, b""));
    }

    proptest! {
        #[test]
        fn prop_sign_then_verify(body: Vec<u8>, secret: Vec<u8>) {
            let header = sign(&body, &secret);
            prop_assert!(verify_signature(&body, &header, &secret));
        }

        #[test]
        fn prop_body_bit_flip_fails(
            body in proptest::collection::vec(any::<u8>(), 1..256),
            secret: Vec<u8>,
            idx: prop::sample::Index,
            bit in 0u8..8,
        ) {
            let header = sign(&body, &secret);
            let mut tampered = body.clone();
            let i = idx.index(tampered.len());
            tampered[i] ^= 1 << bit;
            prop_assert!(!verify_signature(&tampered, &header, &secret));
        }

        #[test]
        fn prop_signature_bit_flip_fails(
            body: Vec<u8>,
            secret: Vec<u8>,
            idx: prop::sample::Index,
            bit in 0u8..8,
        ) {
            let mut sig = compute_signature(&body, &secret);
            let i = idx.index(sig.len());
            sig[i] ^= 1 << bit;
            let header = format_signature_header(&sig);
            prop_assert!(!verify_signature(&body, &header, &secret));
        }

        #[test]
        fn prop_header_text_bit_flip_fails(
            body: Vec<u8>,
            secret: Vec<u8>,
            idx: prop::sample::Index,
            bit in 0u8..8,
        ) {
            let mut header = sign(&body, &secret).into_bytes();
            let i = idx.index(header.len());
            header[i] ^= 1 << bit;
            // Flips that leave invalid UTF-8 can never arrive as a `&str` header.
            if let Ok(header) = String::from_utf8(header) {
                prop_assert!(!verify_signature(&body, &header, &secret));
            }
        }

        #[test]
        fn prop_missing_prefix_always_fails(header: String, body: Vec<u8>, secret: Vec<u8>) {
            prop_assume!(!header.starts_with("sha256="));
            prop_assert!(!verify_signature(&body, &header, &secret));
        }
    }
}
