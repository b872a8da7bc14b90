//! The Request Pipeline: Signer → Transport → Verifier → Resource Decryptor
//! → JSON decode, composed into one outbound call.
//!
//! Every endpoint binding in `trade.rs`/`refund.rs`/`certificates.rs` goes
//! through [`execute`]. The pipeline recovers nothing locally — every
//! failure bubbles to the caller as a `WechatPayError`.

use crate::config::Config;
use crate::error::{Result, WechatPayError};
use crate::signer;
use crate::transport::{Method, TransportRequest};
use crate::verifier;
use serde_json::Value;
use tracing::{debug, warn};

/// Which of the four standard fields the pipeline should fill in from the
/// config snapshot if the caller's body omitted them. Applies to the three
/// create-transaction endpoints (`appid`, `mchid`, `notify_url`) and
/// create-refund (`notify_url` only).
#[derive(Default, Clone, Copy)]
pub struct Prefill {
    pub appid: bool,
    pub mchid: bool,
    pub notify_url: bool,
}

impl Prefill {
    pub const NONE: Prefill = Prefill {
        appid: false,
        mchid: false,
        notify_url: false,
    };
    pub const CREATE_TRANSACTION: Prefill = Prefill {
        appid: true,
        mchid: true,
        notify_url: true,
    };
    pub const CREATE_REFUND: Prefill = Prefill {
        appid: false,
        mchid: false,
        notify_url: true,
    };
}

fn apply_prefill(body: &mut Value, config: &Config, prefill: Prefill) {
    let Value::Object(map) = body else {
        return;
    };
    if prefill.appid && !map.contains_key("appid") {
        map.insert("appid".to_string(), Value::String(config.app_id.clone()));
    }
    if prefill.mchid && !map.contains_key("mchid") {
        map.insert("mchid".to_string(), Value::String(config.mch_id.clone()));
    }
    if prefill.notify_url && !map.contains_key("notify_url") {
        map.insert(
            "notify_url".to_string(),
            Value::String(config.notify_url.clone()),
        );
    }
}

/// Runs one outbound operation end to end and returns the decoded JSON
/// body. An empty, verified 2xx body yields `Value::Null`.
pub async fn execute_json(
    config: &Config,
    method: Method,
    path: &str,
    query: Vec<(String, String)>,
    body: Option<Value>,
    prefill: Prefill,
) -> Result<Value> {
    let mut body = body.unwrap_or(Value::Null);
    if method == Method::Post {
        apply_prefill(&mut body, config, prefill);
    }

    let body_bytes: Vec<u8> = if method == Method::Post && !body.is_null() {
        config.json.encode(&body)?
    } else {
        Vec::new()
    };

    let envelope = signer::sign(config, method, path, &query, &body_bytes)?;

    let headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
        ("Authorization".to_string(), envelope.authorization),
    ];

    debug!(method = method.as_str(), url = %envelope.canonical_url, "signing wechat pay request");

    let request = TransportRequest {
        method,
        url: format!("https://{}{}", config.service_host, envelope.canonical_url),
        headers,
        body: envelope.body,
        timeout: config.timeout,
    };

    let response = config.transport.exchange(request).await?;

    if !response.is_success() {
        return Err(WechatPayError::BadResponse {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).to_string(),
        });
    }

    if !verifier::verify(config, &response.headers, &response.body) {
        warn!(status = response.status, "wechat pay response failed verification");
        return Err(WechatPayError::VerifyFail(
            "response signature did not verify".into(),
        ));
    }

    if response.body.is_empty() {
        return Ok(Value::Null);
    }

    config.json.decode(&response.body)
}

/// Same as [`execute_json`] but decodes the result into `T`.
pub async fn execute<T: serde::de::DeserializeOwned>(
    config: &Config,
    method: Method,
    path: &str,
    query: Vec<(String, String)>,
    body: Option<Value>,
    prefill: Prefill,
) -> Result<T> {
    let value = execute_json(config, method, path, query, body, prefill).await?;
    serde_json::from_value(value).map_err(|e| WechatPayError::DecodeFail(e.to_string()))
}

/// Same as [`execute_json`] but discards the result, for endpoints (like
/// close-transaction) that return nothing on success.
pub async fn execute_unit(
    config: &Config,
    method: Method,
    path: &str,
    query: Vec<(String, String)>,
    body: Option<Value>,
    prefill: Prefill,
) -> Result<()> {
    execute_json(config, method, path, query, body, prefill).await?;
    Ok(())
}
