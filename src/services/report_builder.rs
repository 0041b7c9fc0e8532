//! 报告聚合服务 - 业务能力层
//!
//! 纯聚合：把乱序到达的逐条结果还原成按输入顺序的最终报告

use crate::models::{ItemOutcome, JobReport};
use std::collections::BTreeMap;
use tracing::warn;

/// 报告构建器
///
/// 结果按请求序号登记（只写一次），build 时按序号升序输出，
/// 成功/失败计数从实际条目统计得出，绝不估算。
#[derive(Debug, Default)]
pub struct ReportBuilder {
    outcomes: BTreeMap<usize, ItemOutcome>,
}

impl ReportBuilder {
    /// 创建新的报告构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条结果（同一序号只认第一次写入）
    pub fn record(&mut self, request_index: usize, outcome: ItemOutcome) {
        if self.outcomes.contains_key(&request_index) {
            warn!("⚠️ 序号 {} 的结果重复登记，忽略后到者", request_index);
            return;
        }
        self.outcomes.insert(request_index, outcome);
    }

    /// 是否已登记该序号
    pub fn contains(&self, request_index: usize) -> bool {
        self.outcomes.contains_key(&request_index)
    }

    /// 已登记的结果数量
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// 生成最终报告（消费自身，结果按输入顺序排列）
    pub fn build(self) -> JobReport {
        let items: Vec<ItemOutcome> = self.outcomes.into_values().collect();
        let successful = items.iter().filter(|o| o.is_success()).count();
        let failed = items.len() - successful;

        JobReport {
            total: items.len(),
            successful,
            failed,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailReason, FormatTag};

    fn success(title: &str) -> ItemOutcome {
        ItemOutcome::Success {
            title: title.to_string(),
            format: FormatTag::Epub,
        }
    }

    fn failed(title: &str) -> ItemOutcome {
        ItemOutcome::Failed {
            title: title.to_string(),
            reason: FailReason::NotFound,
        }
    }

    #[test]
    fn test_out_of_order_records_rebuild_input_order() {
        let mut builder = ReportBuilder::new();
        builder.record(2, failed("third"));
        builder.record(0, success("first"));
        builder.record(1, success("second"));

        let report = builder.build();
        let titles: Vec<&str> = report.items.iter().map(|o| o.title()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_counts_add_up() {
        let mut builder = ReportBuilder::new();
        builder.record(0, success("a"));
        builder.record(1, failed("b"));
        builder.record(2, failed("c"));

        let report = builder.build();
        assert_eq!(report.total, 3);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.successful + report.failed, report.total);
    }

    #[test]
    fn test_duplicate_record_keeps_first_write() {
        let mut builder = ReportBuilder::new();
        builder.record(0, success("a"));
        builder.record(0, failed("a"));

        let report = builder.build();
        assert_eq!(report.total, 1);
        assert!(report.items[0].is_success());
    }
}
