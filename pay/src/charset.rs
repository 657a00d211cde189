//! 字符集转换
//!
//! 支付宝的异步通知可能声明 GBK 等字符集, 验签前需要把参数值转换到
//! 对方签名时使用的编码.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use encoding_rs::{Encoding, GBK, UTF_8};

use crate::{PayError, PayResult, Params};

/// 参数值为原始字节的参数集合
pub type RawParams = BTreeMap<String, Vec<u8>>;

/// 未声明字符集的异步通知按 gb2312 处理
pub const NOTIFY_DEFAULT_CHARSET: &str = "gb2312";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset(&'static Encoding);

impl Charset {
    pub fn utf8() -> Self {
        Charset(UTF_8)
    }

    pub fn gbk() -> Self {
        Charset(GBK)
    }

    /// 按 WHATWG 标签查找, 例如 `utf-8`, `gbk`, `gb2312`, `gb18030`
    pub fn for_label(label: &str) -> PayResult<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Charset)
            .ok_or_else(|| PayError::InvalidConfig(format!("unknown charset: {label}")))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// 解码为字符串, 非法字节替换为 U+FFFD
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        self.0.decode_without_bom_handling(bytes).0
    }

    /// 编码为本字符集的字节, 无法表示的字符输出为 HTML 数字实体
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        self.0.encode(text).0
    }
}

impl Default for Charset {
    fn default() -> Self {
        Charset::utf8()
    }
}

impl Display for Charset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Charset::for_label(s)
    }
}

/// 把每个参数值从 `from` 转换到 `to`, 二者相同时原样返回
pub fn transcode<'a>(value: &'a [u8], from: Charset, to: Charset) -> Cow<'a, [u8]> {
    if from == to {
        return Cow::Borrowed(value);
    }

    match from.decode(value) {
        Cow::Borrowed(text) => to.encode(text),
        Cow::Owned(text) => Cow::Owned(to.encode(&text).into_owned()),
    }
}

pub fn normalize(params: &RawParams, from: Charset, to: Charset) -> RawParams {
    params
        .iter()
        .map(|(key, value)| (key.clone(), transcode(value, from, to).into_owned()))
        .collect()
}

/// 按 `from` 解码为 UTF-8 字符串参数
pub fn decode_params(params: &RawParams, from: Charset) -> Params {
    params
        .iter()
        .map(|(key, value)| (key.clone(), from.decode(value).into_owned()))
        .collect()
}

/// 按参数中声明的 `charset` 转换, 未声明时使用 `default`
pub fn declared(params: &RawParams, default: &str) -> PayResult<Charset> {
    let label = params
        .get("charset")
        .map(|value| String::from_utf8_lossy(value).into_owned())
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| default.to_string());

    Charset::for_label(&label)
}
