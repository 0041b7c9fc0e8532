//! # Book Batch Fetcher
//!
//! 一个用于批量解析书单、检索下载并打包归档的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（reqwest::Client），只暴露能力
//! - `HttpExecutor` - 唯一的 client owner，提供 JSON 查询与字节下载能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条书目或单一聚合职责
//! - `parse_book_list` - 书单文本解析能力
//! - `CatalogResolver` - 目录检索与匹配能力
//! - `Fetcher` - 带重试的下载能力
//! - `ArchiveAssembler` - 归档打包能力
//! - `ReportBuilder` - 结果聚合能力
//! - `WarnWriter` - 写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一本书"的完整处理流程
//! - `BookCtx` - 上下文封装（job_id + 请求序号）
//! - `BookFlow` - 流程编排（检索 → 下载 → warn）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_manager` - 任务生命周期，提交/查询/取消/归档提取
//! - `orchestrator/job_runner` - 并发派发与结果聚合
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{CatalogSource, HttpCatalogClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::HttpExecutor;
pub use models::{
    ArchiveHandle, BookRequest, CatalogEntry, CatalogMatch, FailReason, FetchedArtifact,
    FormatTag, ItemOutcome, Job, JobId, JobReport, JobState, MatchConfidence,
};
pub use orchestrator::JobManager;
pub use services::{
    parse_book_list, ArchiveAssembler, CatalogResolver, Fetcher, ReportBuilder, WarnWriter,
};
pub use workflow::{BookCtx, BookFlow};
