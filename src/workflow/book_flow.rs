//! 书目处理流程 - 流程层
//!
//! 核心职责：定义"一本书"的完整处理流程
//!
//! 流程顺序：
//! 1. 目录解析（精确 → 模糊）
//! 2. 下载（格式选择 → 带重试的抓取）
//! 3. warn.txt（兜底记录失败）

use crate::clients::CatalogSource;
use crate::config::Config;
use crate::models::{BookRequest, FailReason, FetchedArtifact, ItemOutcome};
use crate::services::{CatalogResolver, Fetcher, ResolveOutcome, WarnWriter};
use crate::workflow::book_ctx::BookCtx;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// 单本书处理的产物
#[derive(Debug)]
pub struct BookFlowResult {
    /// 终态结果（每条请求恰好一个）
    pub outcome: ItemOutcome,
    /// 下载成功时的文件制品
    pub artifact: Option<FetchedArtifact>,
    /// 本条的搜索能力是否故障（用于整体不可达判定）
    pub catalog_failed: bool,
}

/// 书目处理流程
///
/// - 编排完整的单本书处理流程
/// - 决定何时检索、何时下载、何时兜底
/// - 不持有归档器与报告器（结果交由编排层汇集）
/// - 只依赖业务能力（services）
pub struct BookFlow {
    resolver: CatalogResolver,
    fetcher: Fetcher,
    warn_writer: WarnWriter,
    verbose_logging: bool,
}

impl BookFlow {
    /// 创建新的书目处理流程
    pub fn new(catalog: Arc<dyn CatalogSource>, config: &Config) -> Self {
        Self {
            resolver: CatalogResolver::new(catalog.clone(), config),
            fetcher: Fetcher::new(catalog, config),
            warn_writer: WarnWriter::with_path(config.warn_file.clone()),
            verbose_logging: config.verbose_logging,
        }
    }

    /// 处理一本书：检索 → 下载 → 终态结果
    pub async fn run(&self, request: &BookRequest, ctx: &BookCtx) -> Result<BookFlowResult> {
        self.log_request(ctx, request);

        // ========== 流程 1: 目录解析 ==========
        info!("[书目 {}] 🔍 正在书目源中检索...", ctx.book_number);

        let matched = match self.resolver.resolve(request, ctx.request_index).await {
            ResolveOutcome::Matched(matched) => matched,
            ResolveOutcome::NotFound => {
                warn!("[书目 {}] ⚠️ 未找到匹配条目，写入 warn.txt", ctx.book_number);
                self.write_warn(ctx, request, FailReason::NotFound).await?;
                return Ok(failed_result(request, FailReason::NotFound, false));
            }
            ResolveOutcome::Unavailable => {
                warn!("[书目 {}] ⚠️ 书目源检索故障", ctx.book_number);
                self.write_warn(ctx, request, FailReason::FetchError).await?;
                return Ok(failed_result(request, FailReason::FetchError, true));
            }
        };

        info!(
            "[书目 {}] ✓ 命中条目 {} (置信度: {:?}, 可用格式: {:?})",
            ctx.book_number, matched.source_id, matched.confidence, matched.formats
        );

        // ========== 流程 2: 下载 ==========
        info!("[书目 {}] 📥 正在下载...", ctx.book_number);

        match self.fetcher.fetch(&matched).await {
            Ok(artifact) => {
                info!(
                    "[书目 {}] ✓ 下载成功: {} ({} 字节)",
                    ctx.book_number,
                    artifact.suggested_filename,
                    artifact.bytes.len()
                );
                Ok(BookFlowResult {
                    outcome: ItemOutcome::Success {
                        title: request.title.clone(),
                        format: artifact.format,
                    },
                    artifact: Some(artifact),
                    catalog_failed: false,
                })
            }
            Err(reason) => {
                warn!("[书目 {}] ⚠️ 下载失败: {}", ctx.book_number, reason);
                self.write_warn(ctx, request, reason).await?;
                Ok(failed_result(request, reason, false))
            }
        }
    }

    /// 写入失败记录
    async fn write_warn(&self, ctx: &BookCtx, request: &BookRequest, reason: FailReason) -> Result<()> {
        self.warn_writer
            .write(ctx.book_number, &request.raw_line, reason)
            .await
    }

    // ========== 日志辅助方法 ==========

    /// 显示书目信息
    fn log_request(&self, ctx: &BookCtx, request: &BookRequest) {
        if self.verbose_logging {
            info!(
                "[书目 {}] 原始行: {}",
                ctx.book_number,
                crate::utils::logging::truncate_text(&request.raw_line, 80)
            );
        }
        info!(
            "[书目 {}] 书名: {} | 作者: {}",
            ctx.book_number,
            request.title,
            if request.has_author() {
                request.author.as_str()
            } else {
                "(未知)"
            }
        );
    }
}

/// 构造失败终态
fn failed_result(request: &BookRequest, reason: FailReason, catalog_failed: bool) -> BookFlowResult {
    BookFlowResult {
        outcome: ItemOutcome::Failed {
            title: request.title.clone(),
            reason,
        },
        artifact: None,
        catalog_failed,
    }
}
