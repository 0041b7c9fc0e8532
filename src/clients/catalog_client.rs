/// 书目源 HTTP 客户端
///
/// 封装所有与外部书目源 API 相关的调用逻辑
use crate::clients::CatalogSource;
use crate::config::Config;
use crate::error::{CatalogError, DownloadError};
use crate::infrastructure::HttpExecutor;
use crate::models::{CatalogEntry, FormatTag};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// 书目源 HTTP 客户端
pub struct HttpCatalogClient {
    executor: HttpExecutor,
    base_url: String,
}

impl HttpCatalogClient {
    /// 创建新的书目源客户端
    pub fn new(executor: HttpExecutor, config: &Config) -> Self {
        Self {
            executor,
            base_url: config.catalog_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 提取搜索结果数组
    fn extract_entries(result: &Value) -> Option<&Vec<Value>> {
        result.get("results").and_then(|v| v.as_array())
    }

    /// 将单个 JSON 条目转换为 CatalogEntry
    ///
    /// 缺少 ID 的条目直接丢弃（源端数据不齐是常态）
    fn parse_entry(value: &Value) -> Option<CatalogEntry> {
        let source_id = value.get("id").and_then(|v| v.as_str())?.to_string();
        let title = value
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let author = value
            .get("author")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let formats = value
            .get("extensions")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| e.as_str())
                    .filter_map(FormatTag::find)
                    .collect()
            })
            .unwrap_or_default();

        Some(CatalogEntry {
            source_id,
            title,
            author,
            formats,
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    async fn search(&self, title: &str, author: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = format!("{}/search", self.base_url);
        let result = self
            .executor
            .get_json(&url, &[("title", title), ("author", author)])
            .await?;

        let entries: Vec<CatalogEntry> = Self::extract_entries(&result)
            .map(|arr| arr.iter().filter_map(Self::parse_entry).collect())
            .unwrap_or_default();

        debug!("搜索 \"{}\" 返回 {} 个候选", title, entries.len());
        Ok(entries)
    }

    async fn download(&self, source_id: &str, format: FormatTag) -> Result<Vec<u8>, DownloadError> {
        let url = format!(
            "{}/download/{}/{}",
            self.base_url,
            source_id,
            format.extension()
        );
        self.executor.get_bytes(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_requires_id() {
        let valid = serde_json::json!({
            "id": "42",
            "title": "Dune",
            "author": "Frank Herbert",
            "extensions": ["epub", "pdf", "cbz"]
        });
        let entry = HttpCatalogClient::parse_entry(&valid).unwrap();
        assert_eq!(entry.source_id, "42");
        // 未知扩展名 cbz 被静默丢弃
        assert_eq!(entry.formats, vec![FormatTag::Epub, FormatTag::Pdf]);

        let missing_id = serde_json::json!({ "title": "Dune" });
        assert!(HttpCatalogClient::parse_entry(&missing_id).is_none());
    }
}
