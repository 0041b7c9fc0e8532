//! 任务管理器 - 编排层
//!
//! ## 职责
//!
//! 1. **任务生命周期**：Pending → Running → Completed / Failed
//! 2. **提交入口**：异步提交（立即返回任务ID）与同步等待两种边界
//! 3. **状态查询**：随时返回任务快照（终态含报告与归档句柄）
//! 4. **取消**：向在途工作任务广播取消信号
//! 5. **归档提取**：仅对 Completed 任务开放
//!
//! ## 设计特点
//!
//! - **失败隔离**：单条书目失败只体现在该条的结果里；
//!   只有空书单、书目源整体不可达、取消、整体超时才让任务失败
//! - **核心不删除任务**：留存/清退交给外部协作方

use crate::clients::{CatalogSource, HttpCatalogClient};
use crate::config::Config;
use crate::error::{AppError, JobError, ParseError};
use crate::infrastructure::HttpExecutor;
use crate::models::{Job, JobId, JobState};
use crate::orchestrator::job_runner;
use crate::services::request_parser;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

/// 任务管理器
#[derive(Clone)]
pub struct JobManager {
    config: Config,
    catalog: Arc<dyn CatalogSource>,
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    cancels: Arc<RwLock<HashMap<JobId, watch::Sender<bool>>>>,
}

impl JobManager {
    /// 使用自定义书目源创建（测试中注入内存实现）
    pub fn new(config: Config, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            config,
            catalog,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            cancels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 使用真实 HTTP 书目源创建
    pub fn with_http_catalog(config: Config) -> Result<Self> {
        let executor = HttpExecutor::new(&config)?;
        let catalog: Arc<dyn CatalogSource> = Arc::new(HttpCatalogClient::new(executor, &config));
        Ok(Self::new(config, catalog))
    }

    /// 异步提交：立即返回任务ID，处理在后台进行
    pub async fn submit(&self, raw_text: &str) -> JobId {
        let job_id = self.register_job().await;
        let manager = self.clone();
        let raw_text = raw_text.to_string();

        tokio::spawn(async move {
            manager.execute(job_id, &raw_text).await;
        });

        job_id
    }

    /// 同步边界：提交并等待任务终态，返回最终快照
    pub async fn run_to_completion(&self, raw_text: &str) -> Result<Job> {
        let job_id = self.register_job().await;
        self.execute(job_id, raw_text).await;
        self.status(job_id)
            .await
            .ok_or_else(|| anyhow::anyhow!(JobError::NotFound { id: job_id }))
    }

    /// 查询任务状态快照
    pub async fn status(&self, job_id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// 取消在途任务
    ///
    /// 返回是否发出了取消信号（终态任务返回 false）
    pub async fn cancel(&self, job_id: JobId) -> bool {
        let cancels = self.cancels.read().await;
        match cancels.get(&job_id) {
            Some(sender) => {
                let _ = sender.send(true);
                info!("🛑 已发送取消信号: {}", job_id);
                true
            }
            None => {
                warn!("取消失败，任务不存在或已终结: {}", job_id);
                false
            }
        }
    }

    /// 提取归档字节（仅 Completed 任务）
    pub async fn archive_bytes(&self, job_id: JobId) -> Result<Vec<u8>, AppError> {
        let jobs = self.jobs.read().await;
        let job = jobs
            .get(&job_id)
            .ok_or(AppError::Job(JobError::NotFound { id: job_id }))?;

        if job.state != JobState::Completed {
            return Err(AppError::Job(JobError::NotCompleted {
                state: job.state.to_string(),
            }));
        }

        let handle = job.archive.as_ref().ok_or(AppError::Job(JobError::NotCompleted {
            state: job.state.to_string(),
        }))?;
        Ok(handle.read_bytes()?)
    }

    // ========== 内部实现 ==========

    /// 登记一个 Pending 任务及其取消通道
    async fn register_job(&self) -> JobId {
        let job_id = uuid::Uuid::new_v4();
        let (cancel_tx, _) = watch::channel(false);

        self.jobs.write().await.insert(job_id, Job::new(job_id));
        self.cancels.write().await.insert(job_id, cancel_tx);

        info!("📝 新任务已登记: {}", job_id);
        job_id
    }

    /// 执行任务的完整生命周期
    async fn execute(&self, job_id: JobId, raw_text: &str) {
        // 解析失败：直接 Pending → Failed，不做任何流水线工作
        let requests = match request_parser::parse_book_list(raw_text) {
            Ok(requests) => requests,
            Err(e @ ParseError::EmptyInput) => {
                warn!("任务 {} 输入无效: {}", job_id, e);
                self.mark_failed(job_id, e.to_string()).await;
                return;
            }
        };

        self.set_state(job_id, JobState::Running).await;

        let cancel_rx = match self.cancels.read().await.get(&job_id) {
            Some(sender) => sender.subscribe(),
            None => {
                error!("任务 {} 缺少取消通道", job_id);
                return;
            }
        };

        match job_runner::run_job(job_id, requests, self.catalog.clone(), &self.config, cancel_rx)
            .await
        {
            Ok((report, handle)) => {
                info!(
                    "✅ 任务 {} 完成: 成功 {}/{}",
                    job_id, report.successful, report.total
                );
                let mut jobs = self.jobs.write().await;
                if let Some(job) = jobs.get_mut(&job_id) {
                    job.state = JobState::Completed;
                    job.report = Some(report);
                    job.archive = Some(handle);
                }
            }
            Err(e) => {
                error!("❌ 任务 {} 失败: {}", job_id, e);
                self.mark_failed(job_id, e.to_string()).await;
            }
        }

        // 任务终结后撤掉取消通道
        self.cancels.write().await.remove(&job_id);
    }

    async fn set_state(&self, job_id: JobId, state: JobState) {
        if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
            job.state = state;
        }
    }

    async fn mark_failed(&self, job_id: JobId, error_msg: String) {
        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&job_id) {
                job.state = JobState::Failed;
                job.error = Some(error_msg);
            }
        }
        self.cancels.write().await.remove(&job_id);
    }
}
