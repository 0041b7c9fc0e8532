//! 下载服务 - 业务能力层
//!
//! 负责把一个目录匹配变成已下载的文件制品，带超时与重试策略

use crate::clients::CatalogSource;
use crate::config::Config;
use crate::models::{CatalogMatch, FailReason, FetchedArtifact, FormatTag};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// 下载服务
///
/// 职责：
/// - 按配置的格式优先级挑选要下载的格式
/// - 执行带单次超时与指数退避重试的下载
/// - 派生确定性的建议文件名（重名消解交给归档器）
pub struct Fetcher {
    catalog: Arc<dyn CatalogSource>,
    enabled_formats: Vec<FormatTag>,
    max_attempts: usize,
    attempt_timeout: Duration,
    retry_base_delay: Duration,
}

impl Fetcher {
    /// 创建新的下载服务
    pub fn new(catalog: Arc<dyn CatalogSource>, config: &Config) -> Self {
        Self {
            catalog,
            enabled_formats: config.enabled_formats.clone(),
            max_attempts: config.max_download_attempts.max(1),
            attempt_timeout: Duration::from_secs(config.request_timeout_secs),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// 下载匹配条目的最优可用格式
    pub async fn fetch(&self, matched: &CatalogMatch) -> Result<FetchedArtifact, FailReason> {
        let format = match select_format(&self.enabled_formats, &matched.formats) {
            Some(format) => format,
            None => {
                warn!(
                    "\"{}\" 没有已启用的可用格式 (源端提供: {:?})",
                    matched.title, matched.formats
                );
                return Err(FailReason::DownloadDisallowed);
            }
        };

        let bytes = self
            .download_with_retry(&matched.source_id, format, &matched.title)
            .await?;

        Ok(FetchedArtifact {
            request_index: matched.request_index,
            format,
            bytes,
            suggested_filename: build_filename(&matched.title, format),
        })
    }

    /// 带退避的有限次重试下载
    ///
    /// 瞬时故障（超时、5xx、限流）重试，其余立即终止；
    /// 重试耗尽时按最后一次的故障类别报告 Timeout 或 FetchError。
    async fn download_with_retry(
        &self,
        source_id: &str,
        format: FormatTag,
        title: &str,
    ) -> Result<Vec<u8>, FailReason> {
        let mut last_was_timeout = false;

        for attempt in 1..=self.max_attempts {
            match timeout(self.attempt_timeout, self.catalog.download(source_id, format)).await {
                // 单次尝试超时
                Err(_) => {
                    warn!("\"{}\" 第 {}/{} 次下载超时", title, attempt, self.max_attempts);
                    last_was_timeout = true;
                }
                Ok(Ok(bytes)) => {
                    debug!(
                        "\"{}\" 下载成功 ({} 字节, 第 {} 次尝试)",
                        title,
                        bytes.len(),
                        attempt
                    );
                    return Ok(bytes);
                }
                Ok(Err(e)) if e.is_retryable() => {
                    warn!(
                        "\"{}\" 第 {}/{} 次下载失败: {}",
                        title, attempt, self.max_attempts, e
                    );
                    last_was_timeout = e.is_timeout();
                }
                // 不可重试的错误立即终止
                Ok(Err(e)) => {
                    warn!("\"{}\" 下载失败（不重试）: {}", title, e);
                    return Err(FailReason::FetchError);
                }
            }

            if attempt < self.max_attempts {
                let backoff = self.retry_base_delay * 2u32.pow((attempt - 1) as u32);
                sleep(backoff).await;
            }
        }

        Err(if last_was_timeout {
            FailReason::Timeout
        } else {
            FailReason::FetchError
        })
    }
}

/// 按配置的优先级顺序挑选第一个源端可用的格式
pub(crate) fn select_format(enabled: &[FormatTag], available: &[FormatTag]) -> Option<FormatTag> {
    enabled.iter().copied().find(|f| available.contains(f))
}

/// 由请求书名派生确定性文件名
///
/// 去掉文件系统敌对字符，压缩空白，限制长度，空名退化为 "book"
pub fn build_filename(title: &str, format: FormatTag) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut stem = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if stem.is_empty() {
        stem = "book".to_string();
    }
    if stem.chars().count() > 100 {
        stem = stem.chars().take(100).collect::<String>().trim_end().to_string();
    }

    format!("{}.{}", stem, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_format_follows_priority() {
        let enabled = [FormatTag::Epub, FormatTag::Pdf];
        // 源端顺序不决定选择，优先级列表决定
        assert_eq!(
            select_format(&enabled, &[FormatTag::Pdf, FormatTag::Epub]),
            Some(FormatTag::Epub)
        );
        assert_eq!(
            select_format(&enabled, &[FormatTag::Pdf, FormatTag::Mobi]),
            Some(FormatTag::Pdf)
        );
        // 没有已启用的格式
        assert_eq!(select_format(&enabled, &[FormatTag::Mobi]), None);
        assert_eq!(select_format(&enabled, &[]), None);
    }

    #[test]
    fn test_build_filename_sanitizes() {
        assert_eq!(
            build_filename("The Great Gatsby", FormatTag::Epub),
            "The Great Gatsby.epub"
        );
        assert_eq!(
            build_filename("What If? Serious/Weird: Questions", FormatTag::Pdf),
            "What If Serious Weird Questions.pdf"
        );
        // 全是敌对字符时退化为 book
        assert_eq!(build_filename("///???", FormatTag::Txt), "book.txt");
    }

    #[test]
    fn test_build_filename_is_deterministic() {
        let a = build_filename("Dune: Messiah", FormatTag::Epub);
        let b = build_filename("Dune: Messiah", FormatTag::Epub);
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_filename_truncates_long_titles() {
        let long_title = "x".repeat(300);
        let name = build_filename(&long_title, FormatTag::Pdf);
        assert!(name.chars().count() <= 104);
        assert!(name.ends_with(".pdf"));
    }
}
