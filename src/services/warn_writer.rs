//! 失败书目记录服务 - 业务能力层
//!
//! 只负责"把失败的书目写进 warn.txt"能力，不关心流程

use crate::models::FailReason;
use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

/// 失败书目记录器
///
/// 职责：
/// - 将未能下载的书目逐条追加到记录文件（人工补救清单）
/// - 只处理单条书目
/// - 不关心流程顺序
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 创建新的失败书目记录器
    pub fn new() -> Self {
        Self {
            warn_file_path: "warn.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    /// 追加一条失败记录
    ///
    /// # 参数
    /// - `line_number`: 书目在原始书单中的行号（从1开始）
    /// - `raw_line`: 原始输入行
    /// - `reason`: 失败原因
    pub async fn write(&self, line_number: usize, raw_line: &str, reason: FailReason) -> Result<()> {
        debug!(
            "写入失败记录: 第 {} 行 | {} | 原因: {}",
            line_number, raw_line, reason
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)?;

        let warn_msg = format!("第 {} 行 | {} | 原因: {}\n", line_number, raw_line, reason);
        file.write_all(warn_msg.as_bytes())?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warn.txt");
        let writer = WarnWriter::with_path(path.display().to_string());

        tokio_test::block_on(async {
            writer
                .write(1, "Ghost Book by Nobody", FailReason::NotFound)
                .await
                .unwrap();
            writer
                .write(3, "Slow Book by Someone", FailReason::Timeout)
                .await
                .unwrap();
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Not found"));
        assert!(lines[1].contains("第 3 行"));
    }
}
