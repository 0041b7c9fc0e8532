use crate::models::format::FormatTag;

/// 书目源返回的候选条目
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CatalogEntry {
    /// 条目在书目源中的内部ID
    pub source_id: String,
    pub title: String,
    pub author: String,
    /// 可用格式（按源端返回顺序）
    pub formats: Vec<FormatTag>,
}

/// 匹配置信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MatchConfidence {
    /// 标题与作者归一化后完全一致
    Exact,
    /// 相似度超过阈值的最优候选
    Fuzzy,
}

/// 一次成功的目录匹配
///
/// 没有匹配不是错误值，而是该条请求的 NotFound 终态。
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    /// 对应请求在原始输入中的序号（从0开始）
    pub request_index: usize,
    /// 原始请求的书名（用于派生文件名）
    pub title: String,
    /// 命中条目的源端ID
    pub source_id: String,
    /// 可用格式
    pub formats: Vec<FormatTag>,
    pub confidence: MatchConfidence,
}
