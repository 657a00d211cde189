use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

use common::{ApiResponse, ApiResult, IsEmpty};
use pay::{AliPay, PayResponse};

use crate::AppState;

pub struct AlipayController;

impl AlipayController {
    /// 下单, 网站支付直接返回自动提交的表单
    pub async fn pay(
        State(state): State<AppState>,
        Path(gateway): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> ApiResult<Response> {
        let out_trade_no = query.get("out_trade_no").cloned();

        let mut order = query
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect::<Map<String, Value>>();
        if out_trade_no.is_empty() {
            order.insert(
                "out_trade_no".into(),
                chrono::Local::now().timestamp_millis().to_string().into(),
            );
        }

        let response = state.alipay.pay_with(&gateway, order).await?;

        Ok(match response {
            PayResponse::Form { .. } => Html(response.to_html().unwrap_or_default()).into_response(),
            PayResponse::Query(order_string) => ApiResponse::success(Value::String(order_string)).into_response(),
            PayResponse::Api(result) => ApiResponse::success(Value::Object(result)).into_response(),
        })
    }

    /// 支付宝异步通知, 验签通过后才应答 `success`
    pub async fn notify(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
        match state.alipay.verify_form(&body) {
            Ok(params) => {
                tracing::info!(
                    out_trade_no = params.get("out_trade_no").map(String::as_str).unwrap_or_default(),
                    trade_status = params.get("trade_status").map(String::as_str).unwrap_or_default(),
                    "alipay notify verified"
                );

                (StatusCode::OK, AliPay::success())
            }
            Err(e) => {
                tracing::warn!("alipay notify rejected: {}", e);

                (StatusCode::BAD_REQUEST, "fail")
            }
        }
    }

    pub async fn find(
        State(state): State<AppState>,
        Path(order): Path<String>,
    ) -> ApiResult<ApiResponse<Map<String, Value>>> {
        Ok(ApiResponse::success(state.alipay.find(order).await?))
    }

    pub async fn find_refund(
        State(state): State<AppState>,
        Path(order): Path<String>,
    ) -> ApiResult<ApiResponse<Map<String, Value>>> {
        Ok(ApiResponse::success(state.alipay.find_refund(order).await?))
    }

    pub async fn refund(
        State(state): State<AppState>,
        Json(order): Json<Map<String, Value>>,
    ) -> ApiResult<ApiResponse<Map<String, Value>>> {
        Ok(ApiResponse::success(state.alipay.refund(order).await?))
    }

    pub async fn cancel(
        State(state): State<AppState>,
        Path(order): Path<String>,
    ) -> ApiResult<ApiResponse<Map<String, Value>>> {
        Ok(ApiResponse::success(state.alipay.cancel(order).await?))
    }

    pub async fn close(
        State(state): State<AppState>,
        Path(order): Path<String>,
    ) -> ApiResult<ApiResponse<Map<String, Value>>> {
        Ok(ApiResponse::success(state.alipay.close(order).await?))
    }

    /// 对账单下载地址
    pub async fn download(
        State(state): State<AppState>,
        Path(date): Path<String>,
    ) -> ApiResult<ApiResponse<String>> {
        Ok(ApiResponse::success(state.alipay.download(date).await?))
    }
}
