/// 一条"书名 by 作者"书目请求
///
/// 由书单中的一行非空白文本构建，此后不再变更。
/// 文本完全相同的两行也是两条独立请求，各自拥有自己的结果。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BookRequest {
    /// 原始输入行（去除首尾空白后）
    pub raw_line: String,
    /// 书名
    pub title: String,
    /// 作者（行内没有分隔符时为空字符串）
    pub author: String,
}

impl BookRequest {
    /// 从单行文本构建请求
    ///
    /// 按最后一次出现的 " by " 拆分，作者取尾段，
    /// 这样书名本身含 " by " 的行也能正确解析；
    /// 没有分隔符时整行视为书名，作者为空。
    pub fn from_line(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.rfind(" by ") {
            Some(pos) => Self {
                raw_line: trimmed.to_string(),
                title: trimmed[..pos].trim().to_string(),
                author: trimmed[pos + 4..].trim().to_string(),
            },
            None => Self {
                raw_line: trimmed.to_string(),
                title: trimmed.to_string(),
                author: String::new(),
            },
        }
    }

    /// 是否带作者信息
    pub fn has_author(&self) -> bool {
        !self.author.is_empty()
    }
}
