pub mod cert_store;
pub mod certificates;
pub mod client;
pub mod config;
pub mod crypto;
pub mod decryptor;
pub mod error;
pub mod json;
pub mod miniapp;
pub mod notify;
pub mod pipeline;
pub mod refresher;
pub mod refund;
pub mod signer;
pub mod trade;
pub mod transport;
pub mod util;
pub mod verifier;

pub use client::{WechatPayClient, WechatPayClientBuilder};
pub use config::{Config, ConfigPatch, ConfigSettings, ConfigStore};
pub use error::WechatPayError;
pub use notify::Event;
