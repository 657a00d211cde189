use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SignType;

/// 默认请求超时时间 (秒)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 网关环境
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// 正式环境
    #[default]
    Normal,
    /// 沙箱环境
    #[serde(alias = "sandbox")]
    Dev,
}

impl Mode {
    pub fn base_uri(&self) -> &'static str {
        match self {
            Mode::Normal => "https://openapi.alipay.com/gateway.do",
            Mode::Dev => "https://openapi-sandbox.dl.alipaydev.com/gateway.do",
        }
    }
}

/// 支付宝应用配置
///
/// 密钥可以是 PEM、不带头尾的 base64 主体或 `.pem` 文件路径.
/// `ali_public_key` 也可以是支付宝公钥证书.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app_id: String,
    /// 应用私钥
    pub private_key: String,
    /// 支付宝公钥, 用于同步响应和异步通知的验签
    #[serde(default)]
    pub ali_public_key: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub notify_url: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub sign_type: SignType,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 应用公钥证书, 公钥证书模式下使用
    #[serde(default)]
    pub app_cert: Option<String>,
    /// 支付宝根证书, 公钥证书模式下使用
    #[serde(default)]
    pub alipay_root_cert: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app_id: String::new(),
            private_key: String::new(),
            ali_public_key: None,
            return_url: None,
            notify_url: None,
            mode: Mode::default(),
            sign_type: SignType::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            app_cert: None,
            alipay_root_cert: None,
        }
    }
}

impl Config {
    pub fn new(app_id: impl Into<String>, private_key: impl Into<String>) -> Self {
        Config {
            app_id: app_id.into(),
            private_key: private_key.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_uri() {
        assert_eq!(Mode::Normal.base_uri(), "https://openapi.alipay.com/gateway.do");
        assert!(Mode::Dev.base_uri().contains("alipaydev.com"));
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "app_id": "2021000000000000",
            "private_key": "MIIE...",
            "mode": "sandbox",
        }))
        .unwrap();

        assert_eq!(config.mode, Mode::Dev);
        assert_eq!(config.sign_type, SignType::Rsa2);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.ali_public_key.is_none());
    }

    #[test]
    fn default_timeout() {
        assert_eq!(Config::default().timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(Config::new("2021000000000000", "MIIE...").timeout_secs, 30);
    }

    #[test]
    fn deserialize_sign_type() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "app_id": "2021000000000000",
            "private_key": "MIIE...",
            "mode": "normal",
            "sign_type": "RSA",
            "timeout_secs": 5,
        }))
        .unwrap();

        assert_eq!(config.mode, Mode::Normal);
        assert_eq!(config.sign_type, SignType::Rsa);
        assert_eq!(config.timeout_secs, 5);
    }
}
