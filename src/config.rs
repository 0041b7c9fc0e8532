use crate::error::ConfigError;
use crate::models::format::FormatTag;
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时下载的书目数量
    pub max_concurrent_downloads: usize,
    /// 书目源 API 根地址
    pub catalog_base_url: String,
    /// 单次网络请求超时（秒）
    pub request_timeout_secs: u64,
    /// 单本书的最大下载尝试次数
    pub max_download_attempts: usize,
    /// 重试退避基础间隔（毫秒，按指数增长）
    pub retry_base_delay_ms: u64,
    /// 模糊匹配相似度阈值（0-1）
    pub fuzzy_match_threshold: f64,
    /// 启用的格式优先级列表（靠前优先，不在列表中的格式不会下载）
    pub enabled_formats: Vec<FormatTag>,
    /// 单个文件的大小上限（字节）
    pub max_download_bytes: usize,
    /// 归档输出目录
    pub archive_dir: String,
    /// 书单输入文件
    pub book_list_file: String,
    /// 报告输出文件
    pub report_file: String,
    /// 失败书目记录文件
    pub warn_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 整个任务的时限（秒，0 表示不限制）
    pub job_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 5,
            catalog_base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
            max_download_attempts: 3,
            retry_base_delay_ms: 500,
            fuzzy_match_threshold: 0.5,
            enabled_formats: vec![
                FormatTag::Epub,
                FormatTag::Pdf,
                FormatTag::Mobi,
                FormatTag::Azw3,
                FormatTag::Txt,
            ],
            max_download_bytes: 256 * 1024 * 1024,
            archive_dir: "archives".to_string(),
            book_list_file: "books.txt".to_string(),
            report_file: "report.json".to_string(),
            warn_file: "warn.txt".to_string(),
            verbose_logging: false,
            job_timeout_secs: 0,
        }
    }
}

impl Config {
    /// 从默认位置加载配置
    ///
    /// 存在 config.toml 则先读取，再逐项叠加环境变量覆盖
    pub fn load() -> Self {
        let mut config = if Path::new("config.toml").exists() {
            match Self::from_file("config.toml") {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("⚠️ 配置文件加载失败，使用默认配置: {}", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env();
        config
    }

    /// 从 TOML 文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::ReadFailed {
            path: path_str.clone(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path_str,
            source: e,
        })
    }

    /// 用环境变量覆盖配置项
    fn apply_env(&mut self) {
        if let Some(v) = std::env::var("MAX_CONCURRENT_DOWNLOADS").ok().and_then(|v| v.parse().ok()) { self.max_concurrent_downloads = v; }
        if let Ok(v) = std::env::var("CATALOG_BASE_URL") { self.catalog_base_url = v; }
        if let Some(v) = std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) { self.request_timeout_secs = v; }
        if let Some(v) = std::env::var("MAX_DOWNLOAD_ATTEMPTS").ok().and_then(|v| v.parse().ok()) { self.max_download_attempts = v; }
        if let Some(v) = std::env::var("RETRY_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()) { self.retry_base_delay_ms = v; }
        if let Some(v) = std::env::var("FUZZY_MATCH_THRESHOLD").ok().and_then(|v| v.parse().ok()) { self.fuzzy_match_threshold = v; }
        if let Ok(v) = std::env::var("ENABLED_FORMATS") {
            let formats: Vec<FormatTag> = v.split(',').filter_map(FormatTag::find).collect();
            if !formats.is_empty() { self.enabled_formats = formats; }
        }
        if let Some(v) = std::env::var("MAX_DOWNLOAD_BYTES").ok().and_then(|v| v.parse().ok()) { self.max_download_bytes = v; }
        if let Ok(v) = std::env::var("ARCHIVE_DIR") { self.archive_dir = v; }
        if let Ok(v) = std::env::var("BOOK_LIST_FILE") { self.book_list_file = v; }
        if let Ok(v) = std::env::var("REPORT_FILE") { self.report_file = v; }
        if let Ok(v) = std::env::var("WARN_FILE") { self.warn_file = v; }
        if let Some(v) = std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()) { self.verbose_logging = v; }
        if let Some(v) = std::env::var("JOB_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) { self.job_timeout_secs = v; }
    }
}
