//! 异步通知验签
//!
//! 支付宝以 `application/x-www-form-urlencoded` POST 通知商户. 参数值按通知中
//! 声明的 `charset` 转换为 UTF-8 后, 去掉 `sign` 与 `sign_type` 拼接待签名字符串,
//! 用支付宝公钥验签. 验签失败一律返回 [`PayError::InvalidSign`].

use percent_encoding::percent_decode;
use serde_json::Value;
use tracing::{debug, warn, Span};

use crate::canonical::canonicalize_notify;
use crate::charset::{self, Charset, RawParams, NOTIFY_DEFAULT_CHARSET};
use crate::{sign, PayError, PayResult, Params, PublicKey, SignType};

/// 验签通过后应答支付宝的内容, 其他任何内容都会让支付宝稍后重发
pub const SUCCESS: &str = "success";

#[derive(Debug, Clone)]
pub struct NotifyVerifier {
    public_key: PublicKey,
    span: Span,
}

impl NotifyVerifier {
    pub fn new(public_key: PublicKey) -> Self {
        NotifyVerifier {
            public_key,
            span: Span::current(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 原始请求体
    pub fn verify_form(&self, body: &[u8]) -> PayResult<Params> {
        self.verify(&parse_form(body))
    }

    /// 参数值为原始字节, 按声明的字符集转换后验签
    pub fn verify(&self, raw: &RawParams) -> PayResult<Params> {
        self.span.in_scope(|| {
            let from = charset::declared(raw, NOTIFY_DEFAULT_CHARSET)
                .map_err(|e| reject(e.to_string(), &charset::decode_params(raw, Charset::utf8())))?;

            let normalized = charset::normalize(raw, from, Charset::utf8());
            let params = charset::decode_params(&normalized, Charset::utf8());

            debug!(charset = %from, params = ?params, "receive alipay notify");

            self.check(params)
        })
    }

    /// 已由 web 框架按 UTF-8 解码的参数
    pub fn verify_params(&self, params: Params) -> PayResult<Params> {
        self.span.in_scope(|| {
            debug!(params = ?params, "receive alipay notify");

            self.check(params)
        })
    }

    fn check(&self, params: Params) -> PayResult<Params> {
        let signature = match params.get("sign") {
            Some(signature) if !signature.is_empty() => signature,
            _ => return Err(reject("missing sign", &params)),
        };

        let sign_type = match params.get("sign_type").filter(|s| !s.is_empty()) {
            Some(sign_type) => sign_type
                .parse::<SignType>()
                .map_err(|e| reject(e.to_string(), &params))?,
            None => SignType::default(),
        };

        let content = canonicalize_notify(&params);
        match sign::verify(content.as_bytes(), signature, &self.public_key, sign_type) {
            Ok(true) => Ok(params),
            Ok(false) => Err(reject("signature mismatch", &params)),
            Err(e) => Err(reject(e.to_string(), &params)),
        }
    }
}

fn reject(reason: impl Into<String>, params: &Params) -> PayError {
    let reason = reason.into();
    warn!(reason = %reason, params = ?params, "alipay sign verify failed");

    PayError::invalid_sign(reason, params_value(params))
}

pub(crate) fn params_value(params: &Params) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}

/// 解析 urlencoded 请求体, 参数值保留为字节以便之后按声明的字符集解码
pub fn parse_form(body: &[u8]) -> RawParams {
    let mut params = RawParams::new();

    for pair in body.split(|b| *b == b'&').filter(|pair| !pair.is_empty()) {
        let mut parts = pair.splitn(2, |b| *b == b'=');
        let key = decode_component(parts.next().unwrap_or_default());
        let value = decode_component(parts.next().unwrap_or_default());

        params.insert(String::from_utf8_lossy(&key).into_owned(), value);
    }

    params
}

fn decode_component(component: &[u8]) -> Vec<u8> {
    let replaced = component
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect::<Vec<u8>>();

    percent_decode(&replaced).collect()
}
