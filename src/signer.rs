//! The Signer: builds the `Authorization` header for an outbound request.
//!
//! Note the asymmetry with the Verifier (`verifier.rs`): signing prepends
//! method and URL to the string-to-sign; verifying does not. This is
//! intentional — see the Verifier's module doc — and must not be
//! "symmetrized".

use crate::config::Config;
use crate::crypto;
use crate::error::{Result, WechatPayError};
use crate::transport::Method;
use base64::prelude::*;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

const SIGNATURE_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// A signed request, ready to hand to the Transport capability.
pub struct SignedEnvelope {
    pub method: Method,
    pub canonical_url: String,
    pub timestamp: u64,
    pub nonce: String,
    pub body: Vec<u8>,
    pub authorization: String,
}

/// 12 URL-safe base64 characters drawn from 12 random bytes, truncated to
/// the first 12 characters of the encoding.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);
    encoded.chars().take(12).collect()
}

/// Builds the canonical URL: `path` alone if `query` is empty, else
/// `path?k1=v1&k2=v2...` in the exact order `query` was given — the joiner
/// never reorders pairs.
pub fn canonical_url(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let joined = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{joined}")
}

/// Signs `(method, path, query, body)` against `config`'s merchant key and
/// produces the full `Authorization` header value plus the envelope fields
/// the Request Pipeline needs to send the request.
pub fn sign(
    config: &Config,
    method: Method,
    path: &str,
    query: &[(String, String)],
    body: &[u8],
) -> Result<SignedEnvelope> {
    let canonical_url = self::canonical_url(path, query);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| WechatPayError::ConfigInvalid(format!("system clock error: {e}")))?
        .as_secs();

    let nonce = generate_nonce();

    // Body MUST NOT be included in the signature for GET, even if supplied.
    let effective_body: &[u8] = match method {
        Method::Post => body,
        Method::Get => b"",
    };

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}\n{}\n",
        method.as_str(),
        canonical_url,
        timestamp,
        nonce,
        String::from_utf8_lossy(effective_body)
    );

    let signature_bytes = crypto::sign(&config.merchant_private_key, string_to_sign.as_bytes())
        .map_err(|e| WechatPayError::ConfigInvalid(format!("signing failed: {e}")))?;
    let signature = BASE64_STANDARD.encode(signature_bytes);

    let authorization = format!(
        r#"{} mchid="{}",nonce_str="{}",timestamp="{}",serial_no="{}",signature="{}""#,
        SIGNATURE_SCHEME, config.mch_id, nonce, timestamp, config.merchant_serial, signature
    );

    Ok(SignedEnvelope {
        method,
        canonical_url,
        timestamp,
        nonce,
        body: effective_body.to_vec(),
        authorization,
    })
}
