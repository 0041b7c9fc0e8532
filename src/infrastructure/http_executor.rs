//! HTTP 执行器 - 基础设施层
//!
//! 唯一的 reqwest::Client 持有者，向上只暴露两种能力：
//! JSON 查询与字节下载。不理解任何书目业务语义。

use crate::config::Config;
use crate::error::{CatalogError, DownloadError};
use anyhow::Result;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP 执行器
pub struct HttpExecutor {
    client: reqwest::Client,
    max_download_bytes: usize,
}

impl HttpExecutor {
    /// 创建执行器（连接与读取超时在此统一配置）
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_download_bytes: config.max_download_bytes,
        })
    }

    /// 发送 GET 请求并解析 JSON 响应
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, CatalogError> {
        debug!("GET {} (参数: {:?})", url, query);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable {
                endpoint: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::BadResponse {
                endpoint: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| CatalogError::Unavailable {
            endpoint: url.to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&text).map_err(|e| CatalogError::JsonParse { source: e })
    }

    /// 下载字节内容（流式读取，带大小上限）
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        debug!("下载 {}", url);

        let response = self.client.get(url).send().await.map_err(classify_network)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(DownloadError::NotFound);
        }
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify_network)?;
            if bytes.len() + chunk.len() > self.max_download_bytes {
                return Err(DownloadError::TooLarge {
                    size: bytes.len() + chunk.len(),
                    limit: self.max_download_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }
}

/// 将 reqwest 错误归类为下载错误
fn classify_network(err: reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        DownloadError::Timeout
    } else {
        DownloadError::Network { source: err }
    }
}
