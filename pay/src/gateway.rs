//! 支付网关
//!
//! 每种支付方式只决定接口名、`product_code` 以及结果的交付方式,
//! 签名与请求由 [`AliPay`](crate::AliPay) 统一完成.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::{PayError, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gateway {
    /// 刷卡支付
    Pos,
    /// 扫码支付
    Scan,
    /// 手机网站支付
    Wap,
    /// 电脑网站支付
    Web,
    /// APP 支付
    App,
    /// 单笔转账到支付宝账户
    Transfer,
}

/// 支付结果的交付方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 自动提交的表单, 由用户浏览器发起请求
    Form,
    /// 签名后的参数串, 交给客户端 SDK
    Query,
    /// 直接调用接口
    Api,
}

struct Route {
    name: &'static str,
    method: &'static str,
    product_code: Option<&'static str>,
    delivery: Delivery,
}

static ROUTES: [(Gateway, Route); 6] = [
    (
        Gateway::Pos,
        Route {
            name: "pos",
            method: "alipay.trade.pay",
            product_code: Some("FACE_TO_FACE_PAYMENT"),
            delivery: Delivery::Api,
        },
    ),
    (
        Gateway::Scan,
        Route {
            name: "scan",
            method: "alipay.trade.precreate",
            product_code: None,
            delivery: Delivery::Api,
        },
    ),
    (
        Gateway::Wap,
        Route {
            name: "wap",
            method: "alipay.trade.wap.pay",
            product_code: Some("QUICK_WAP_WAY"),
            delivery: Delivery::Form,
        },
    ),
    (
        Gateway::Web,
        Route {
            name: "web",
            method: "alipay.trade.page.pay",
            product_code: Some("FAST_INSTANT_TRADE_PAY"),
            delivery: Delivery::Form,
        },
    ),
    (
        Gateway::App,
        Route {
            name: "app",
            method: "alipay.trade.app.pay",
            product_code: Some("QUICK_MSECURITY_PAY"),
            delivery: Delivery::Query,
        },
    ),
    (
        Gateway::Transfer,
        Route {
            name: "transfer",
            method: "alipay.fund.trans.toaccount.transfer",
            product_code: None,
            delivery: Delivery::Api,
        },
    ),
];

impl Gateway {
    pub const ALL: [Gateway; 6] = [
        Gateway::Pos,
        Gateway::Scan,
        Gateway::Wap,
        Gateway::Web,
        Gateway::App,
        Gateway::Transfer,
    ];

    fn route(&self) -> &'static Route {
        ROUTES
            .iter()
            .find(|(gateway, _)| gateway == self)
            .map(|(_, route)| route)
            .unwrap_or_else(|| unreachable!("gateway {self:?} missing from the route table"))
    }

    pub fn name(&self) -> &'static str {
        self.route().name
    }

    pub fn method(&self) -> &'static str {
        self.route().method
    }

    pub fn product_code(&self) -> Option<&'static str> {
        self.route().product_code
    }

    pub fn delivery(&self) -> Delivery {
        self.route().delivery
    }

    /// 在业务参数中补充本网关固定的字段
    pub(crate) fn shape(&self, biz: &mut Map<String, Value>) {
        if let Some(product_code) = self.product_code() {
            biz.insert("product_code".into(), product_code.into());
        }

        if *self == Gateway::Pos {
            biz.insert("scene".into(), "bar_code".into());
        }
    }
}

impl Display for Gateway {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gateway {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ROUTES
            .iter()
            .find(|(_, route)| route.name.eq_ignore_ascii_case(s.trim()))
            .map(|(gateway, _)| *gateway)
            .ok_or_else(|| PayError::InvalidGateway(s.to_string()))
    }
}

/// 支付下单结果
#[derive(Debug, Clone)]
pub enum PayResponse {
    /// 电脑/手机网站支付: 签名后的参数需由浏览器提交到 `action`
    Form { action: String, fields: Params },
    /// APP 支付: 交给客户端 SDK 的订单串
    Query(String),
    /// 当面付、转账等直接调用接口的结果
    Api(Map<String, Value>),
}

impl PayResponse {
    /// 自动提交的 POST 表单
    pub fn to_html(&self) -> Option<String> {
        let PayResponse::Form { action, fields } = self else {
            return None;
        };

        let mut html = format!(
            "<form id='alipaysubmit' name='alipaysubmit' action='{}' method='POST'>",
            escape(action)
        );
        for (key, val) in fields.iter() {
            html.push_str(&format!(
                "<input type='hidden' name='{}' value='{}'/>",
                escape(key),
                escape(val)
            ));
        }
        html.push_str("<input type='submit' value='ok' style='display:none;'></form>");
        html.push_str("<script>document.forms['alipaysubmit'].submit();</script>");

        Some(html)
    }

    /// 以 GET 方式跳转的完整地址
    pub fn to_redirect_url(&self) -> Option<String> {
        let PayResponse::Form { action, fields } = self else {
            return None;
        };

        let query = serde_urlencoded::to_string(fields).ok()?;
        let separator = if action.contains('?') { '&' } else { '?' };

        Some(format!("{action}{separator}{query}"))
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('\'', "&apos;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
