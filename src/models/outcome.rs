use crate::models::format::FormatTag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单条请求的失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailReason {
    /// 书目源中没有满足匹配策略的条目
    #[serde(rename = "Not found")]
    NotFound,
    /// 下载或检索失败（含重试耗尽）
    #[serde(rename = "Fetch error")]
    FetchError,
    /// 超时类失败耗尽重试
    #[serde(rename = "Timeout")]
    Timeout,
    /// 没有任何已启用的格式可下载
    #[serde(rename = "Download disallowed")]
    DownloadDisallowed,
}

impl FailReason {
    /// 报告中展示的原因文本
    pub fn as_str(self) -> &'static str {
        match self {
            FailReason::NotFound => "Not found",
            FailReason::FetchError => "Fetch error",
            FailReason::Timeout => "Timeout",
            FailReason::DownloadDisallowed => "Download disallowed",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 单条请求的终态结果
///
/// 每条请求恰好产生一个，写入后不再变更。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemOutcome {
    /// 下载成功
    Success { title: String, format: FormatTag },
    /// 处理失败（带具体原因）
    Failed { title: String, reason: FailReason },
}

impl ItemOutcome {
    /// 对应请求的书名
    pub fn title(&self) -> &str {
        match self {
            ItemOutcome::Success { title, .. } | ItemOutcome::Failed { title, .. } => title,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// 整个任务的汇总报告
///
/// items 始终按原始输入顺序排列，与下载完成顺序无关；
/// 计数从实际条目统计得出，successful + failed == total 恒成立。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// 按原始输入顺序排列的逐条结果
    pub items: Vec<ItemOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_outcome_json_shape() {
        // 报告条目的 JSON 形态：status 作为标签，format / reason 跟随其后
        let success = ItemOutcome::Success {
            title: "Dune".to_string(),
            format: FormatTag::Epub,
        };
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["format"], "EPUB");

        let failed = ItemOutcome::Failed {
            title: "Ghost".to_string(),
            reason: FailReason::NotFound,
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "Not found");
    }
}
