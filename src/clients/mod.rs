//! 外部协作方客户端层
//!
//! 书目源需要提供两种能力：搜索与下载。
//! 能力以 trait 抽象，测试中用内存实现替代真实 HTTP 客户端。

pub mod catalog_client;

use crate::error::{CatalogError, DownloadError};
use crate::models::{CatalogEntry, FormatTag};
use async_trait::async_trait;

/// 外部书目源能力抽象
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// 按书名（和作者）搜索候选条目，按源端排序返回
    ///
    /// 空结果表示正常的"没找到"，Err 表示搜索能力本身故障。
    async fn search(&self, title: &str, author: &str) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// 下载指定条目在指定格式下的文件内容
    async fn download(&self, source_id: &str, format: FormatTag) -> Result<Vec<u8>, DownloadError>;
}

pub use catalog_client::HttpCatalogClient;
