use std::fmt;

/// 电子书文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormatTag {
    Epub,
    Pdf,
    Mobi,
    Azw3,
    Txt,
}

/// 扩展名到格式的静态映射表
static EXTENSION_MAP: phf::Map<&'static str, FormatTag> = phf::phf_map! {
    "epub" => FormatTag::Epub,
    "pdf" => FormatTag::Pdf,
    "mobi" => FormatTag::Mobi,
    "azw3" => FormatTag::Azw3,
    "txt" => FormatTag::Txt,
};

impl FormatTag {
    /// 获取标准名称（大写，用于报告展示）
    pub fn name(self) -> &'static str {
        match self {
            FormatTag::Epub => "EPUB",
            FormatTag::Pdf => "PDF",
            FormatTag::Mobi => "MOBI",
            FormatTag::Azw3 => "AZW3",
            FormatTag::Txt => "TXT",
        }
    }

    /// 获取文件扩展名（小写）
    pub fn extension(self) -> &'static str {
        match self {
            FormatTag::Epub => "epub",
            FormatTag::Pdf => "pdf",
            FormatTag::Mobi => "mobi",
            FormatTag::Azw3 => "azw3",
            FormatTag::Txt => "txt",
        }
    }

    /// 从扩展名解析格式（精确匹配，小写）
    pub fn from_extension(ext: &str) -> Option<Self> {
        EXTENSION_MAP.get(ext).copied()
    }

    /// 智能查找格式（容忍大小写、首尾空白与前导点号）
    pub fn find(s: &str) -> Option<Self> {
        let cleaned = s.trim().trim_start_matches('.').to_lowercase();
        Self::from_extension(&cleaned)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_is_lenient() {
        assert_eq!(FormatTag::find(".EPUB"), Some(FormatTag::Epub));
        assert_eq!(FormatTag::find(" pdf "), Some(FormatTag::Pdf));
        assert_eq!(FormatTag::find("doc"), None);
    }

    #[test]
    fn test_serialized_uppercase() {
        // 报告中的格式字段按大写展示
        let json = serde_json::to_string(&FormatTag::Epub).unwrap();
        assert_eq!(json, "\"EPUB\"");
        let parsed: FormatTag = serde_json::from_str("\"AZW3\"").unwrap();
        assert_eq!(parsed, FormatTag::Azw3);
    }
}
