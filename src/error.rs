use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 书单解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 书目源检索错误
    #[error("目录错误: {0}")]
    Catalog(#[from] CatalogError),
    /// 文件下载错误
    #[error("下载错误: {0}")]
    Download(#[from] DownloadError),
    /// 归档打包错误
    #[error("归档错误: {0}")]
    Archive(#[from] ArchiveError),
    /// 任务生命周期错误
    #[error("任务错误: {0}")]
    Job(#[from] JobError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 书单解析错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// 输入为空或全是空白行
    #[error("书单为空，没有可处理的书目请求")]
    EmptyInput,
}

/// 书目源检索错误（调用搜索能力时产生）
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 无法连接到书目源
    #[error("无法连接到书目源 ({endpoint}): {message}")]
    Unavailable { endpoint: String, message: String },
    /// 书目源返回错误状态
    #[error("书目源返回错误响应 ({endpoint}): HTTP {status}")]
    BadResponse { endpoint: String, status: u16 },
    /// 搜索结果解析失败
    #[error("搜索结果解析失败: {source}")]
    JsonParse {
        #[source]
        source: serde_json::Error,
    },
}

/// 文件下载错误（调用下载能力时产生）
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 单次请求超时
    #[error("下载超时")]
    Timeout,
    /// HTTP 状态码错误
    #[error("下载失败: HTTP {status}")]
    HttpStatus { status: u16 },
    /// 文件不存在于书目源
    #[error("文件不存在于书目源")]
    NotFound,
    /// 网络传输失败
    #[error("网络请求失败: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },
    /// 响应体超出大小上限
    #[error("文件超出大小上限: {size} 字节 (上限 {limit})")]
    TooLarge { size: usize, limit: usize },
}

impl DownloadError {
    /// 该错误是否值得重试（瞬时故障：超时、5xx、限流、网络抖动）
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Timeout => true,
            DownloadError::HttpStatus { status } => *status >= 500 || *status == 429,
            DownloadError::Network { .. } => true,
            _ => false,
        }
    }

    /// 该错误是否属于超时类
    pub fn is_timeout(&self) -> bool {
        matches!(self, DownloadError::Timeout)
    }
}

/// 归档打包错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 归档文件读写失败
    #[error("归档读写失败 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 归档已封存，不能再加入文件
    #[error("归档已封存，无法继续加入文件")]
    Finalized,
}

/// 任务生命周期错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// 任务不存在
    #[error("任务不存在: {id}")]
    NotFound { id: uuid::Uuid },
    /// 任务尚未完成，归档不可用
    #[error("任务尚未完成，无法获取归档 (当前状态: {state})")]
    NotCompleted { state: String },
    /// 任务被调用方取消
    #[error("任务已被取消")]
    Cancelled,
    /// 超过整体时限
    #[error("任务超过整体时限")]
    DeadlineExceeded,
    /// 搜索能力对每一条请求都失败
    #[error("书目源完全不可达，任务中止")]
    CatalogUnavailable,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 包装一条无类型的错误信息
    pub fn other(msg: impl Into<String>) -> Self {
        AppError::Other(msg.into())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
