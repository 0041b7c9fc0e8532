use crate::models::format::FormatTag;

/// 已下载的文件制品
///
/// 由下载服务产出并独占持有，交给归档器后所有权随之转移。
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    /// 对应请求在原始输入中的序号（从0开始）
    pub request_index: usize,
    /// 实际下载的格式
    pub format: FormatTag,
    /// 文件内容
    pub bytes: Vec<u8>,
    /// 建议文件名（由请求书名确定性派生；重名消解由归档器负责）
    pub suggested_filename: String,
}
