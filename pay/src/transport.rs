use std::time::Duration;

use async_trait::async_trait;

use crate::PayResult;

/// 向支付宝网关提交表单的 HTTP 通道
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `application/x-www-form-urlencoded` 表单, 返回响应体原始字节
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> PayResult<Vec<u8>>;
}

/// 基于 reqwest 的实现, 每个请求都受超时限制
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> PayResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(HttpTransport { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> PayResult<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}
