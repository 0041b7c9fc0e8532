//! 归档服务 - 业务能力层
//!
//! 把所有下载成功的文件制品打包为单个 tar.gz 归档

use crate::error::ArchiveError;
use crate::models::{ArchiveHandle, FetchedArtifact};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// 归档组装器
///
/// 职责：
/// - 并发安全地收集文件制品
/// - 封存时按请求序号统一派发文件名并消解重名，
///   同样的输入总是得到同样的命名，与下载完成顺序无关
/// - finalize 幂等：第二次调用直接返回缓存的句柄，不重新打包
pub struct ArchiveAssembler {
    output_path: PathBuf,
    inner: Mutex<AssemblerInner>,
}

#[derive(Default)]
struct AssemblerInner {
    artifacts: Vec<FetchedArtifact>,
    finalized: Option<ArchiveHandle>,
}

impl ArchiveAssembler {
    /// 创建组装器，归档将写入指定路径
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            inner: Mutex::new(AssemblerInner::default()),
        }
    }

    /// 加入一个下载成功的制品（可被多个任务并发调用）
    pub fn add(&self, artifact: FetchedArtifact) -> Result<(), ArchiveError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.finalized.is_some() {
            return Err(ArchiveError::Finalized);
        }
        debug!(
            "归档收入: {} ({} 字节)",
            artifact.suggested_filename,
            artifact.bytes.len()
        );
        inner.artifacts.push(artifact);
        Ok(())
    }

    /// 当前已收集的制品数量
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .artifacts
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 丢弃已收集的制品（任务取消时调用，保证不留下残缺归档）
    pub fn discard(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = inner.artifacts.len();
        inner.artifacts.clear();
        if dropped > 0 {
            info!("🗑️ 已丢弃 {} 个未归档的制品", dropped);
        }
    }

    /// 封存归档并返回句柄
    ///
    /// 零制品也产出归档（空归档），保证句柄与报告的契约一致。
    pub fn finalize(&self) -> Result<ArchiveHandle, ArchiveError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = &inner.finalized {
            debug!("归档已封存，返回缓存句柄");
            return Ok(handle.clone());
        }

        // 命名顺序取决于请求在原始输入中的序号，与收集顺序无关
        inner.artifacts.sort_by_key(|a| a.request_index);

        let names = {
            let mut used = HashSet::new();
            inner
                .artifacts
                .iter()
                .map(|a| assign_name(&mut used, &a.suggested_filename))
                .collect::<Vec<String>>()
        };

        write_tar_gz(&self.output_path, &names, &inner.artifacts)?;

        info!(
            "📦 归档已封存: {} ({} 个文件)",
            self.output_path.display(),
            names.len()
        );

        let handle = ArchiveHandle::new(self.output_path.clone());
        inner.finalized = Some(handle.clone());
        Ok(handle)
    }
}

/// 取一个未被占用的文件名，重名依次追加 -2、-3 …
fn assign_name(used: &mut HashSet<String>, wanted: &str) -> String {
    if used.insert(wanted.to_string()) {
        return wanted.to_string();
    }

    let (stem, ext) = split_filename(wanted);
    let mut n = 2;
    loop {
        let candidate = if ext.is_empty() {
            format!("{}-{}", stem, n)
        } else {
            format!("{}-{}.{}", stem, n, ext)
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// 拆分 "stem.ext"，无扩展名时 ext 为空
fn split_filename(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    }
}

/// 把制品序列写成 gzip 压缩的 tar 文件
///
/// 头部元数据固定（mtime 0、mode 0644），同样的输入得到同样的字节
fn write_tar_gz(
    path: &Path,
    names: &[String],
    artifacts: &[FetchedArtifact],
) -> Result<(), ArchiveError> {
    let io_err = |source: std::io::Error| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let file = File::create(path).map_err(io_err)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, artifact) in names.iter().zip(artifacts) {
        let mut header = tar::Header::new_gnu();
        header.set_size(artifact.bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        builder
            .append_data(&mut header, name, artifact.bytes.as_slice())
            .map_err(io_err)?;
    }

    let encoder = builder.into_inner().map_err(io_err)?;
    encoder.finish().map_err(io_err)?;
    Ok(())
}
