use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pay::PayError;
use serde::Serialize;

use crate::response::ApiResponse;

/// 返回资源类型
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// 系统定义错误
#[derive(Debug, Clone, Serialize)]
pub enum ApiError {
    Error(String),
    /// 请求本身不合法: 验签失败、支付方式不存在等
    BadRequest(String),
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Error(err) | ApiError::BadRequest(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Error(e.to_string())
    }
}

impl From<&str> for ApiError {
    fn from(e: &str) -> Self {
        ApiError::Error(e.to_string())
    }
}

impl From<String> for ApiError {
    fn from(e: String) -> Self {
        ApiError::Error(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::Error(value.to_string())
    }
}

impl From<serde_yaml::Error> for ApiError {
    fn from(value: serde_yaml::Error) -> Self {
        ApiError::Error(value.to_string())
    }
}

impl From<PayError> for ApiError {
    fn from(value: PayError) -> Self {
        match value {
            PayError::InvalidSign { .. }
            | PayError::MalformedSignature(_)
            | PayError::InvalidGateway(_) => ApiError::BadRequest(value.to_string()),
            _ => ApiError::Error(value.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Error(_) => StatusCode::OK,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        (status, ApiResponse::<()>::fail_msg(self.to_string())).into_response()
    }
}
