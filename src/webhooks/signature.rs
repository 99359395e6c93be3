//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! When a webhook secret is configured, GitHub signs each delivery and sends
//! the signature in the `X-Hub-Signature-256` header as `sha256=<hex>`.
//! Verification happens before the payload is parsed.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Why a delivery failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,

    #[error("malformed signature header")]
    Malformed,

    #[error("signature does not match payload")]
    Mismatch,
}

/// The shared secret configured on the GitHub webhook.
#[derive(Clone)]
pub struct WebhookSecret(Vec<u8>);

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

impl WebhookSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        WebhookSecret(secret.into())
    }

    /// Signs `payload` and formats the result as a header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use deploy_monitor::webhooks::WebhookSecret;
    ///
    /// let secret = WebhookSecret::new("my-secret-key");
    /// let header = secret.sign(b"Hello, World!");
    ///
    /// assert!(header.starts_with("sha256="));
    /// assert!(secret.verify(b"Hello, World!", Some(&header)).is_ok());
    /// assert!(WebhookSecret::new("other").verify(b"Hello, World!", Some(&header)).is_err());
    /// ```
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size");
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks `header` (the raw `X-Hub-Signature-256` value, if any) against
    /// `payload`. The comparison is constant-time.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::Missing)?;
        let expected = parse_signature_header(header).ok_or(SignatureError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.0).map_err(|_| SignatureError::Mismatch)?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

/// Decodes `sha256=<hex>` into raw bytes. `None` for any other shape.
fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}
