//! 批量任务执行器 - 编排层
//!
//! ## 职责
//!
//! 1. **并发控制**：使用 Semaphore 限制同时在途的下载数量
//! 2. **结果汇集**：工作任务经 mpsc 通道汇入单一聚合循环（唯一写者）
//! 3. **顺序还原**：结果按请求序号归位，与完成顺序无关
//! 4. **整体判定**：书目源全体不可达 / 取消 / 整体超时 → 任务失败
//! 5. **归档封存**：所有请求终态后统一封存归档

use crate::clients::CatalogSource;
use crate::config::Config;
use crate::error::{AppError, JobError};
use crate::models::{
    ArchiveHandle, BookRequest, FailReason, FetchedArtifact, ItemOutcome, JobId, JobReport,
};
use crate::services::{ArchiveAssembler, ReportBuilder};
use crate::workflow::{BookCtx, BookFlow};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// 工作任务发回聚合循环的消息
struct WorkerMessage {
    request_index: usize,
    outcome: ItemOutcome,
    artifact: Option<FetchedArtifact>,
    catalog_failed: bool,
}

/// 执行一个任务的全部请求，返回最终报告与归档句柄
///
/// 每条请求一个工作任务，由信号量限制并发；
/// 取消信号或整体时限触发时丢弃已收集的制品并中止，不产出归档。
pub async fn run_job(
    job_id: JobId,
    requests: Vec<BookRequest>,
    catalog: Arc<dyn CatalogSource>,
    config: &Config,
    cancel_rx: watch::Receiver<bool>,
) -> Result<(JobReport, ArchiveHandle), AppError> {
    let total = requests.len();
    let archive_path = Path::new(&config.archive_dir).join(format!("{}.tar.gz", job_id));
    let assembler = Arc::new(ArchiveAssembler::new(archive_path));

    info!(
        "📦 任务 {} 开始: 共 {} 本书, 并发上限 {}",
        job_id, total, config.max_concurrent_downloads
    );

    let result = tokio::select! {
        res = run_pipeline(job_id, requests, catalog, config, assembler.clone(), cancel_rx.clone()) => res,
        _ = wait_cancelled(cancel_rx.clone()) => {
            warn!("🛑 任务 {} 收到取消信号", job_id);
            Err(AppError::Job(JobError::Cancelled))
        }
        _ = wait_deadline(config.job_timeout_secs) => {
            error!("⏰ 任务 {} 超过整体时限 ({} 秒)", job_id, config.job_timeout_secs);
            Err(AppError::Job(JobError::DeadlineExceeded))
        }
    };

    match result {
        Ok(report) => {
            let handle = assembler.finalize()?;
            Ok((report, handle))
        }
        Err(e) => {
            // 失败路径不产出归档：丢弃所有已收集的制品
            assembler.discard();
            Err(e)
        }
    }
}

/// 派发全部请求并聚合结果（唯一写者循环）
async fn run_pipeline(
    job_id: JobId,
    requests: Vec<BookRequest>,
    catalog: Arc<dyn CatalogSource>,
    config: &Config,
    assembler: Arc<ArchiveAssembler>,
    cancel_rx: watch::Receiver<bool>,
) -> Result<JobReport, AppError> {
    let total = requests.len();
    let titles: Vec<String> = requests.iter().map(|r| r.title.clone()).collect();
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));
    // 容量与请求数一致，工作任务发送结果永不阻塞
    let (tx, mut rx) = mpsc::channel::<WorkerMessage>(total.max(1));
    let flow = Arc::new(BookFlow::new(catalog, config));

    // ========== 派发：每条请求一个工作任务 ==========
    for (request_index, request) in requests.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::other(format!("信号量获取失败: {}", e)))?;
        let flow = flow.clone();
        let tx = tx.clone();
        let mut worker_cancel = cancel_rx.clone();
        let ctx = BookCtx::new(job_id, request_index);

        tokio::spawn(async move {
            let _permit = permit;

            let message = tokio::select! {
                result = flow.run(&request, &ctx) => match result {
                    Ok(flow_result) => WorkerMessage {
                        request_index,
                        outcome: flow_result.outcome,
                        artifact: flow_result.artifact,
                        catalog_failed: flow_result.catalog_failed,
                    },
                    Err(e) => {
                        error!("[书目 {}] ❌ 处理过程中发生错误: {}", ctx.book_number, e);
                        cancelled_message(request_index, &request)
                    }
                },
                _ = worker_cancel.changed() => {
                    // 取消：中止在途下载，按抓取失败记录
                    cancelled_message(request_index, &request)
                }
            };

            let _ = tx.send(message).await;
        });
    }
    drop(tx);

    // ========== 聚合：唯一写者循环 ==========
    let mut report_builder = ReportBuilder::new();
    let mut catalog_failures = 0usize;
    let mut received = 0usize;

    while received < total {
        let Some(message) = rx.recv().await else {
            // 有工作任务异常退出（panic 等），缺失的结果稍后补记
            warn!("⚠️ 结果通道提前关闭 (已收 {}/{})", received, total);
            break;
        };
        received += 1;

        if message.catalog_failed {
            catalog_failures += 1;
        }

        if let Some(artifact) = message.artifact {
            assembler.add(artifact)?;
        }

        report_builder.record(message.request_index, message.outcome);

        info!("📊 任务 {} 进度: {}/{}", job_id, received, total);
    }

    // 异常退出的工作任务补记为抓取失败，保证报告逐条齐全
    for (index, title) in titles.iter().enumerate() {
        if !report_builder.contains(index) {
            report_builder.record(
                index,
                ItemOutcome::Failed {
                    title: title.clone(),
                    reason: FailReason::FetchError,
                },
            );
        }
    }

    // 搜索能力对每一条请求都失败：整体不可达，任务失败
    if total > 0 && catalog_failures == total {
        return Err(AppError::Job(JobError::CatalogUnavailable));
    }

    Ok(report_builder.build())
}

/// 取消时工作任务上报的终态
fn cancelled_message(request_index: usize, request: &BookRequest) -> WorkerMessage {
    WorkerMessage {
        request_index,
        outcome: ItemOutcome::Failed {
            title: request.title.clone(),
            reason: FailReason::FetchError,
        },
        artifact: None,
        catalog_failed: false,
    }
}

/// 等待取消信号（发送端关闭且从未取消时永远挂起）
async fn wait_cancelled(mut cancel_rx: watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

/// 等待整体时限（0 表示不限制，永远挂起）
async fn wait_deadline(timeout_secs: u64) {
    if timeout_secs == 0 {
        futures::future::pending::<()>().await;
    }
    sleep(Duration::from_secs(timeout_secs)).await;
}
