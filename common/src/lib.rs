use tracing::Level;

pub use application::Application;
pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;

pub mod application;
pub mod error;
pub mod response;

/// 初始化日志输出, 无法识别的级别按 info 处理
pub fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// 检测是否为null
pub trait IsEmpty {
    fn is_empty(&self) -> bool;
}

impl IsEmpty for Option<String> {
    /// 检测字符串是否为空
    fn is_empty(&self) -> bool {
        match self {
            Some(s) => s.trim().is_empty(),
            _ => true,
        }
    }
}
