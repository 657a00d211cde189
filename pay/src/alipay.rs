use std::collections::BTreeMap;

use serde_json::value::RawValue;
use serde_json::{Map, Value};
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::cert::CertX509;
use crate::charset::{Charset, RawParams};
use crate::gateway::{Delivery, Gateway, PayResponse};
use crate::notify::{self, NotifyVerifier};
use crate::sign::{self, PrivateKey, PublicKey, SignType};
use crate::transport::{HttpTransport, Transport};
use crate::{Config, GatewayError, Mode, Params, PayError, PayResult, Sign};

/// 接口调用成功的业务返回码
const SUCCESS_CODE: &str = "10000";

const CHARSET: &str = "utf-8";

pub const METHOD_QUERY: &str = "alipay.trade.query";
pub const METHOD_REFUND_QUERY: &str = "alipay.trade.fastpay.refund.query";
pub const METHOD_REFUND: &str = "alipay.trade.refund";
pub const METHOD_CANCEL: &str = "alipay.trade.cancel";
pub const METHOD_CLOSE: &str = "alipay.trade.close";
pub const METHOD_BILL: &str = "alipay.data.dataservice.bill.downloadurl.query";

/// 订单或账单参数: 单个编号, 或完整的业务参数
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Identifier(String),
    Structured(Map<String, Value>),
}

impl Order {
    /// 解析为业务参数, 单个编号由 `identify` 展开
    fn resolve(self, identify: impl FnOnce(String) -> Map<String, Value>) -> Map<String, Value> {
        match self {
            Order::Identifier(id) => identify(id),
            Order::Structured(biz) => biz,
        }
    }

    fn into_trade(self) -> Map<String, Value> {
        self.resolve(|out_trade_no| {
            let mut biz = Map::new();
            biz.insert("out_trade_no".into(), out_trade_no.into());
            biz
        })
    }

    fn into_bill(self) -> Map<String, Value> {
        self.resolve(|bill_date| {
            let mut biz = Map::new();
            biz.insert("bill_type".into(), "trade".into());
            biz.insert("bill_date".into(), bill_date.into());
            biz
        })
    }
}

impl From<&str> for Order {
    fn from(value: &str) -> Self {
        Order::Identifier(value.to_string())
    }
}

impl From<String> for Order {
    fn from(value: String) -> Self {
        Order::Identifier(value)
    }
}

impl From<Map<String, Value>> for Order {
    fn from(value: Map<String, Value>) -> Self {
        Order::Structured(value)
    }
}

/// 支付宝开放平台客户端
///
/// 只持有不可变的配置, 每次调用独立构造并签名参数, 可在多个任务间共享.
#[derive(Debug)]
pub struct AliPay<T = HttpTransport> {
    app_id: String,
    private_key: PrivateKey,
    public_key: Option<PublicKey>,
    return_url: Option<String>,
    notify_url: Option<String>,
    sign_type: SignType,
    mode: Mode,
    /// (app_cert_sn, alipay_root_cert_sn)
    cert_sn: Option<(String, String)>,
    transport: T,
    span: Span,
}

impl<T> Sign for AliPay<T> {
    fn sign_type(&self) -> SignType {
        self.sign_type
    }

    fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

impl AliPay<HttpTransport> {
    pub fn new(config: &Config) -> PayResult<Self> {
        let transport = HttpTransport::new(config.timeout())?;

        AliPay::with_transport(config, transport)
    }

    /// 验签通过后应答支付宝异步通知的内容
    pub fn success() -> &'static str {
        notify::SUCCESS
    }
}

impl<T: Transport> AliPay<T> {
    pub fn with_transport(config: &Config, transport: T) -> PayResult<Self> {
        if config.app_id.trim().is_empty() {
            return Err(PayError::InvalidConfig("app_id is required".into()));
        }

        if config.timeout_secs == 0 {
            return Err(PayError::InvalidConfig("timeout_secs must be greater than 0".into()));
        }

        if config.private_key.trim().is_empty() {
            return Err(PayError::InvalidConfig("private_key is required".into()));
        }
        let private_key = PrivateKey::parse(&config.private_key)?;

        let public_key = non_empty(&config.ali_public_key)
            .map(PublicKey::parse)
            .transpose()?;

        let cert_sn = match (non_empty(&config.app_cert), non_empty(&config.alipay_root_cert)) {
            (Some(app_cert), Some(root_cert)) => Some((
                CertX509::cert_sn(&sign::load(app_cert, "app cert")?)?,
                CertX509::root_cert_sn(&sign::load(root_cert, "alipay root cert")?)?,
            )),
            (None, None) => None,
            _ => {
                return Err(PayError::InvalidConfig(
                    "app_cert and alipay_root_cert must be configured together".into(),
                ))
            }
        };

        Ok(AliPay {
            app_id: config.app_id.trim().to_string(),
            private_key,
            public_key,
            return_url: non_empty(&config.return_url).map(str::to_string),
            notify_url: non_empty(&config.notify_url).map(str::to_string),
            sign_type: config.sign_type,
            mode: config.mode,
            cert_sn,
            transport,
            span: info_span!("alipay", app_id = %config.app_id.trim(), mode = ?config.mode),
        })
    }

    /// 替换日志 span, 所有事件都记录在该 span 下
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 当前环境的网关地址
    pub fn gateway(&self) -> &'static str {
        self.mode.base_uri()
    }

    fn endpoint(&self) -> String {
        format!("{}?charset={}", self.gateway(), CHARSET)
    }

    /// 查询订单
    pub async fn find(&self, order: impl Into<Order>) -> PayResult<Map<String, Value>> {
        self.execute(METHOD_QUERY, order.into().into_trade()).await
    }

    /// 查询退款
    pub async fn find_refund(&self, order: impl Into<Order>) -> PayResult<Map<String, Value>> {
        self.execute(METHOD_REFUND_QUERY, order.into().into_trade())
            .await
    }

    /// 退款, 需要完整的业务参数 (订单号与退款金额)
    pub async fn refund(&self, order: Map<String, Value>) -> PayResult<Map<String, Value>> {
        self.execute(METHOD_REFUND, order).await
    }

    /// 撤销订单
    pub async fn cancel(&self, order: impl Into<Order>) -> PayResult<Map<String, Value>> {
        self.execute(METHOD_CANCEL, order.into().into_trade()).await
    }

    /// 关闭订单
    pub async fn close(&self, order: impl Into<Order>) -> PayResult<Map<String, Value>> {
        self.execute(METHOD_CLOSE, order.into().into_trade()).await
    }

    /// 查询对账单下载地址. 单个日期按交易账单查询.
    ///
    /// 响应中没有成功对象时返回空字符串.
    pub async fn download(&self, bill: impl Into<Order>) -> PayResult<String> {
        let params = self.sign_payload(METHOD_BILL, &bill.into().into_bill(), None, None)?;

        let result = self.call(METHOD_BILL, params).await?;

        Ok(result
            .and_then(|object| object.get("bill_download_url").map(crate::value_to_string))
            .unwrap_or_default())
    }

    /// 调用任意开放平台接口
    pub async fn execute(&self, method: &str, biz: Map<String, Value>) -> PayResult<Map<String, Value>> {
        let params = self.sign_payload(method, &biz, None, None)?;

        self.call(method, params)
            .await?
            .ok_or_else(|| PayError::Response(format!("{} not found", response_key(method))))
    }

    /// 下单支付
    ///
    /// 订单参数中的 `return_url` / `notify_url` 会覆盖配置中的地址, 不进入 `biz_content`.
    pub async fn pay(&self, gateway: Gateway, mut order: Map<String, Value>) -> PayResult<PayResponse> {
        let return_url = order.remove("return_url").and_then(|v| override_url(&v));
        let notify_url = order.remove("notify_url").and_then(|v| override_url(&v));
        gateway.shape(&mut order);

        let method = gateway.method();
        let params = self.sign_payload(method, &order, return_url.as_deref(), notify_url.as_deref())?;

        self.span.in_scope(|| debug!(gateway = %gateway, payload = ?params, "alipay pay"));

        match gateway.delivery() {
            Delivery::Form => Ok(PayResponse::Form {
                action: self.endpoint(),
                fields: without_empty(params),
            }),
            Delivery::Query => Ok(PayResponse::Query(serde_urlencoded::to_string(
                without_empty(params),
            )?)),
            Delivery::Api => self
                .call(method, params)
                .await?
                .map(PayResponse::Api)
                .ok_or_else(|| PayError::Response(format!("{} not found", response_key(method)))),
        }
    }

    /// 按名称下单, 名称不存在时返回 [`PayError::InvalidGateway`]
    pub async fn pay_with(&self, gateway: &str, order: Map<String, Value>) -> PayResult<PayResponse> {
        self.pay(gateway.parse()?, order).await
    }

    /// 刷卡支付
    pub async fn pos(&self, order: Map<String, Value>) -> PayResult<PayResponse> {
        self.pay(Gateway::Pos, order).await
    }

    /// 扫码支付
    pub async fn scan(&self, order: Map<String, Value>) -> PayResult<PayResponse> {
        self.pay(Gateway::Scan, order).await
    }

    /// 手机网站支付
    pub async fn wap(&self, order: Map<String, Value>) -> PayResult<PayResponse> {
        self.pay(Gateway::Wap, order).await
    }

    /// 电脑网站支付
    pub async fn web(&self, order: Map<String, Value>) -> PayResult<PayResponse> {
        self.pay(Gateway::Web, order).await
    }

    /// APP 支付
    pub async fn app(&self, order: Map<String, Value>) -> PayResult<PayResponse> {
        self.pay(Gateway::App, order).await
    }

    /// 单笔转账到支付宝账户
    pub async fn transfer(&self, order: Map<String, Value>) -> PayResult<PayResponse> {
        self.pay(Gateway::Transfer, order).await
    }

    /// 异步通知验签, 参数为原始请求体
    pub fn verify_form(&self, body: &[u8]) -> PayResult<Params> {
        self.notify_verifier()?.verify_form(body)
    }

    /// 异步通知验签, 参数值为原始字节
    pub fn verify(&self, raw: &RawParams) -> PayResult<Params> {
        self.notify_verifier()?.verify(raw)
    }

    /// 异步通知验签, 参数已按 UTF-8 解码
    pub fn verify_params(&self, params: Params) -> PayResult<Params> {
        self.notify_verifier()?.verify_params(params)
    }

    fn notify_verifier(&self) -> PayResult<NotifyVerifier> {
        Ok(NotifyVerifier::new(self.public_key()?.clone()).with_span(self.span.clone()))
    }

    fn public_key(&self) -> PayResult<&PublicKey> {
        self.public_key
            .as_ref()
            .ok_or_else(|| PayError::InvalidConfig("ali_public_key is required to verify alipay signatures".into()))
    }

    /// 组装公共参数与业务参数并签名
    pub fn sign_payload(
        &self,
        method: &str,
        biz: &Map<String, Value>,
        return_url: Option<&str>,
        notify_url: Option<&str>,
    ) -> PayResult<Params> {
        let mut params = Params::new();
        params.insert("app_id".into(), self.app_id.clone());
        params.insert("method".into(), method.to_string());
        params.insert("format".into(), "JSON".into());
        params.insert("charset".into(), CHARSET.into());
        params.insert("sign_type".into(), self.sign_type.as_str().into());
        params.insert("version".into(), "1.0".into());
        params.insert(
            "timestamp".into(),
            chrono::Local::now().format("%F %T").to_string(),
        );
        params.insert(
            "return_url".into(),
            return_url.or(self.return_url.as_deref()).unwrap_or_default().into(),
        );
        params.insert(
            "notify_url".into(),
            notify_url.or(self.notify_url.as_deref()).unwrap_or_default().into(),
        );
        params.insert("biz_content".into(), serde_json::to_string(biz)?);

        if let Some((app_cert_sn, root_cert_sn)) = &self.cert_sn {
            params.insert("app_cert_sn".into(), app_cert_sn.clone());
            params.insert("alipay_root_cert_sn".into(), root_cert_sn.clone());
        }

        let signature = Sign::sign(self, &params)?;
        params.insert("sign".into(), signature);

        Ok(params)
    }

    /// 发送请求并校验响应. 响应中没有接口对应的对象时返回 `None`,
    /// 只有 `error_response` 时返回网关错误.
    async fn call(&self, method: &str, params: Params) -> PayResult<Option<Map<String, Value>>> {
        let span = self.span.clone();

        async move {
            let public_key = self.public_key()?;
            let form = without_empty(params).into_iter().collect::<Vec<_>>();

            debug!(method, gateway = self.gateway(), payload = ?form, "request alipay api");

            let body = self.transport.post_form(&self.endpoint(), &form).await?;
            let text = Charset::utf8().decode(&body);

            debug!(method, response = %text, "alipay api response");

            verify_response(&text, method, public_key, self.sign_type)
        }
        .instrument(span)
        .await
    }
}

/// `alipay.trade.query` -> `alipay_trade_query_response`
pub fn response_key(method: &str) -> String {
    format!("{}_response", method.replace('.', "_"))
}

/// 校验同步响应: 签名覆盖响应对象的原始 JSON 文本
fn verify_response(
    text: &str,
    method: &str,
    public_key: &PublicKey,
    sign_type: SignType,
) -> PayResult<Option<Map<String, Value>>> {
    let envelope = serde_json::from_str::<BTreeMap<String, &RawValue>>(text)
        .map_err(|e| PayError::Response(format!("invalid json: {e}")))?;
    let raw = || serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));

    let key = response_key(method);
    let Some(content) = envelope.get(&key) else {
        if let Some(error) = envelope.get("error_response") {
            let object = serde_json::from_str::<Map<String, Value>>(error.get())?;
            let err = GatewayError::from_object(&object, raw());
            info!(method, error = %err, "alipay api error");

            return Err(err.into());
        }

        return Ok(None);
    };

    let object = serde_json::from_str::<Map<String, Value>>(content.get())
        .map_err(|e| PayError::Response(format!("{key}: {e}")))?;
    let code = object.get("code").map(crate::value_to_string).unwrap_or_default();

    let signature = envelope
        .get("sign")
        .map(|sign| serde_json::from_str::<String>(sign.get()))
        .transpose()
        .map_err(|e| PayError::Response(format!("sign: {e}")))?;

    match signature {
        Some(signature) => {
            match sign::verify(content.get().as_bytes(), &signature, public_key, sign_type) {
                Ok(true) => {}
                Ok(false) => return Err(reject_response("signature mismatch", raw())),
                Err(e) => return Err(reject_response(e.to_string(), raw())),
            }
        }
        None if code == SUCCESS_CODE => return Err(reject_response("missing sign", raw())),
        None => {}
    }

    if code != SUCCESS_CODE {
        let err = GatewayError::from_object(&object, raw());
        info!(method, error = %err, "alipay api error");

        return Err(err.into());
    }

    Ok(Some(object))
}

fn reject_response(reason: impl Into<String>, data: Value) -> PayError {
    let reason = reason.into();
    warn!(reason = %reason, response = %data, "alipay response sign verify failed");

    PayError::invalid_sign(reason, data)
}

fn without_empty(params: Params) -> Params {
    params.into_iter().filter(|(_, value)| !value.is_empty()).collect()
}

/// `null` 与空字符串视为未指定, 使用配置中的地址
fn override_url(value: &Value) -> Option<String> {
    Some(crate::value_to_string(value))
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
