//! Alipay open API client.
//!
//! Builds signed request payloads, dispatches them to the gateway of the
//! configured environment, verifies the signed responses and checks the
//! asynchronous notifications Alipay posts back to the merchant.

use std::collections::BTreeMap;

use serde_json::Value;

pub use alipay::{AliPay, Order};
pub use charset::Charset;
pub use config::{Config, Mode};
pub use gateway::{Gateway, PayResponse};
pub use sign::{PrivateKey, PublicKey, SignType};
pub use transport::{HttpTransport, Transport};

pub mod alipay;
pub mod canonical;
pub mod cert;
pub mod charset;
pub mod config;
pub mod gateway;
pub mod notify;
pub mod sign;
pub mod transport;

/// 一次调用的参数集合, 键按字节序排列
pub type Params = BTreeMap<String, String>;

pub type PayResult<T> = Result<T, PayError>;

#[derive(Debug, thiserror::Error)]
pub enum PayError {
    /// 不存在的支付网关
    #[error("pay gateway [{0}] not exists")]
    InvalidGateway(String),

    /// 签名校验失败, 携带原始数据用于审计
    #[error("alipay sign verify failed: {reason}")]
    InvalidSign { reason: String, data: Box<Value> },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// 密钥缺失或无法解析
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// 签名不是合法的 base64, 无法校验
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// 支付宝返回的业务错误
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Response(String),

    #[error(transparent)]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encode(#[from] serde_urlencoded::ser::Error),
}

impl PayError {
    pub fn invalid_sign(reason: impl Into<String>, data: impl Into<Value>) -> Self {
        PayError::InvalidSign {
            reason: reason.into(),
            data: Box::new(data.into()),
        }
    }

    /// Only transport failures may be resubmitted by the caller; every other
    /// category means the request was seen and judged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PayError::Transport(_))
    }
}

/// Structured error returned by the Alipay gateway.
#[derive(Debug, Clone)]
pub struct GatewayError {
    pub code: String,
    pub msg: String,
    pub sub_code: Option<String>,
    pub sub_msg: Option<String>,
    /// 完整的响应内容
    pub raw: Value,
}

impl GatewayError {
    pub(crate) fn from_object(object: &serde_json::Map<String, Value>, raw: Value) -> Self {
        let field = |key: &str| object.get(key).map(value_to_string);

        GatewayError {
            code: field("code").unwrap_or_default(),
            msg: field("msg").unwrap_or_default(),
            sub_code: field("sub_code"),
            sub_msg: field("sub_msg"),
            raw,
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "alipay api error [{}] {}", self.code, self.msg)?;
        if let Some(sub_code) = &self.sub_code {
            write!(f, " ({sub_code}")?;
            if let Some(sub_msg) = &self.sub_msg {
                write!(f, ": {sub_msg}")?;
            }
            write!(f, ")")?;
        }

        Ok(())
    }
}

impl std::error::Error for GatewayError {}

/// 签名方式与私钥, 为实现者提供对参数集合的签名
pub trait Sign {
    fn sign_type(&self) -> SignType;
    fn private_key(&self) -> &PrivateKey;

    fn sign(&self, params: &Params) -> PayResult<String> {
        let content = canonical::canonicalize(params);

        sign::sign(content.as_bytes(), self.private_key(), self.sign_type())
    }
}

pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_display() {
        let mut object = serde_json::Map::new();
        object.insert("code".into(), "40004".into());
        object.insert("msg".into(), "Business Failed".into());
        object.insert("sub_code".into(), "ACQ.TRADE_NOT_EXIST".into());
        object.insert("sub_msg".into(), "交易不存在".into());

        let err = GatewayError::from_object(&object, Value::Null);
        assert_eq!(
            err.to_string(),
            "alipay api error [40004] Business Failed (ACQ.TRADE_NOT_EXIST: 交易不存在)"
        );
    }

    #[test]
    fn only_transport_is_retryable() {
        assert!(!PayError::InvalidConfig("app_id".into()).is_retryable());
        assert!(!PayError::invalid_sign("forged", Value::Null).is_retryable());
        assert!(!PayError::Response("empty".into()).is_retryable());
    }
}
