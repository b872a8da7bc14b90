//! Typed errors surfaced at every crate boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All failure modes the client can report.
///
/// The pipeline recovers nothing locally: every step below maps onto exactly
/// one variant and bubbles straight to the caller. The Certificate Refresher
/// is the one exception — it logs these and keeps its own schedule.
#[derive(Debug, Error)]
pub enum WechatPayError {
    /// Configuration is missing, malformed, or failed revalidation on `Update`.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// An inbound response or webhook did not verify.
    #[error("signature verification failed: {0}")]
    VerifyFail(String),

    /// AEAD decryption failed or its input was malformed.
    #[error("resource decryption failed: {0}")]
    DecryptFail(String),

    /// The server answered with a non-2xx status. `body` is the raw payload
    /// so callers can pull out WeChat's own `code`/`message` if they want to.
    #[error("wechat pay returned status {status}: {body}")]
    BadResponse { status: u16, body: String },

    /// The transport capability itself failed (network, TLS, timeout).
    #[error("transport error: {0}")]
    TransportFail(String),

    /// A 2xx body was not valid JSON, or did not match the expected shape.
    #[error("failed to decode response body: {0}")]
    DecodeFail(String),

    /// The caller's cancellation signal fired before the request completed.
    #[error("operation canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, WechatPayError>;

/// WeChat's own error envelope, as carried inside `BadResponse.body`.
/// Parsing this is optional for callers; it is provided as a convenience.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WechatPayApiError {
    /// 错误码
    pub code: String,
    /// 错误描述
    pub message: String,
    /// 错误详情
    pub detail: WechatPayErrorDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WechatPayErrorDetail {
    /// 指示错误参数的位置
    pub field: String,
    /// 错误的值
    pub value: String,
    /// 具体错误原因
    pub issue: String,
    /// 出错的位置
    pub location: String,
}
