use crate::error::ArchiveError;
use crate::models::outcome::JobReport;
use chrono::{DateTime, Local};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// 任务标识
pub type JobId = uuid::Uuid;

/// 任务状态机
///
/// Pending → Running → Completed / Failed；
/// Completed 表示每条请求都有了终态结果并产出了归档（哪怕全部失败），
/// Failed 表示任务本身没能运行（空书单、整体不可达、取消、超时）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn name(self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
        }
    }

    /// 是否已到终态
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 已封存归档的不透明引用
///
/// 外部传输层可凭此换取归档的字节流。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    path: PathBuf,
}

impl ArchiveHandle {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// 归档文件所在路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取归档的完整字节内容
    pub fn read_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        fs::read(&self.path).map_err(|e| ArchiveError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// 一次批量下载任务
///
/// 提交原始书单文本即创建，只由任务管理器修改，核心不做删除。
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub created_at: DateTime<Local>,
    /// 终态时附带的汇总报告
    pub report: Option<JobReport>,
    /// Completed 时附带的归档句柄
    pub archive: Option<ArchiveHandle>,
    /// 整个任务失败时的原因描述
    pub error: Option<String>,
}

impl Job {
    pub(crate) fn new(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Pending,
            created_at: Local::now(),
            report: None,
            archive: None,
            error: None,
        }
    }
}
