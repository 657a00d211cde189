use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::value::Value;

use crate::error::{ApiError, ApiResult};

pub const APPLICATION_FILE: &str = "application.yaml";
/// 配置模板, 配置文件不存在时复制一份
pub const EXAMPLE_FILE: &str = ".example.yaml";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Application {
    // 服务域名
    pub host: String,
    // 服务端口
    pub port: u16,
    // 日志级别
    pub log_level: String,
    pub alipay: pay::Config,
}

impl Application {
    pub async fn init() -> ApiResult<Self> {
        Self::load(APPLICATION_FILE).await
    }

    pub async fn load(filename: impl AsRef<Path>) -> ApiResult<Self> {
        let cfg = Application::file_get_content(filename.as_ref()).await?;

        Self::from_value(&cfg)
    }

    pub fn from_value(cfg: &Value) -> ApiResult<Self> {
        Ok(Application {
            host: Self::analysis::<String>("host", cfg)?,
            port: Self::analysis::<u16>("port", cfg)?,
            log_level: Self::analysis::<String>("log_level", cfg).unwrap_or_else(|_| "info".into()),
            alipay: Self::analysis::<pay::Config>("alipay", cfg)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn analysis<T: DeserializeOwned>(key: &str, value: &Value) -> ApiResult<T> {
        let val = match value.get(key) {
            Some(value) => value,
            None => return Err(ApiError::Error(format!("{} 字段不存在", key))),
        };
        Ok(serde_yaml::from_value::<T>(val.clone())?)
    }

    /// 读取文件内容, 文件不存在时从模板创建
    async fn file_get_content(filename: &Path) -> ApiResult<Value> {
        match tokio::fs::read(filename).await {
            Ok(file_content) => serde_yaml::from_slice::<Value>(&file_content).map_err(|e| {
                tracing::error!("请检查 {} 配置信息! err: {}", filename.display(), e);

                ApiError::from(e)
            }),
            Err(_) => {
                tracing::warn!("{} 不存在, 正在创建配置文件 ...", filename.display());
                let example = filename.with_file_name(EXAMPLE_FILE);

                match tokio::fs::copy(&example, filename).await {
                    Ok(_) => {
                        tracing::warn!("配置文件 {} 创建成功, 请填写配置信息!", filename.display());
                        Err(ApiError::Error("请重新填写配置信息".to_string()))
                    }
                    Err(e) => {
                        tracing::error!("应用程序启动失败, 没有找到原始配置文件, err: {}", e);
                        Err(ApiError::from(e))
                    }
                }
            }
        }
    }
}
