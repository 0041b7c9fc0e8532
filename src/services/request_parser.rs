//! 书单解析服务 - 业务能力层
//!
//! 只负责"原始文本 → 结构化请求序列"能力，不关心后续流程

use crate::error::ParseError;
use crate::models::BookRequest;
use tracing::debug;

/// 解析整份书单文本
///
/// 逐行拆分，忽略空白行，其余每行一条请求，保持输入顺序，
/// 任何一行都不会被静默丢弃。
/// 整份输入为空（或全是空白行）时返回 EmptyInput。
pub fn parse_book_list(raw_text: &str) -> Result<Vec<BookRequest>, ParseError> {
    let requests: Vec<BookRequest> = raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(BookRequest::from_line)
        .collect();

    if requests.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    debug!("解析出 {} 条书目请求", requests.len());
    Ok(requests)
}
