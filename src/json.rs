//! The pluggable JSON capability.
//!
//! Endpoint bodies are still modeled as dedicated `serde` records (see
//! `trade.rs`, `refund.rs`); this is the narrow seam the Request Pipeline
//! calls through when turning a `serde_json::Value` into wire bytes and
//! back, so a caller can swap in a different JSON backend without touching
//! any endpoint definition.

use crate::error::{Result, WechatPayError};
use serde_json::Value;

pub trait JsonCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// Default codec, backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| WechatPayError::DecodeFail(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes).map_err(|e| WechatPayError::DecodeFail(e.to_string()))
    }
}
