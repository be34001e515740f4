// 该文件是 Tanlei （探雷） 项目的一部分。
// src/workspace.rs - 工作区管理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::WorkspaceConfig;

#[derive(Error, Debug)]
pub enum WorkspaceError {
  #[error("清理目录失败: {path}: {source}")]
  Reset {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("创建目录失败: {path}: {source}")]
  CreateDir {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("复制文件失败: {from} -> {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    source: std::io::Error,
  },
  #[error("未找到检测输出目录: {0}")]
  NoOutputFound(PathBuf),
  #[error("检测输出图像缺失: {0}")]
  OutputFileMissing(PathBuf),
}

/// 进程内单调递增的毫秒时间戳，保证同一进程签发的名字互不相同
static LAST_ISSUED_MILLIS: AtomicU64 = AtomicU64::new(0);

fn next_unique_millis() -> u64 {
  let now = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as u64)
    .unwrap_or_default();

  let mut last = LAST_ISSUED_MILLIS.load(Ordering::Relaxed);
  loop {
    let candidate = now.max(last + 1);
    match LAST_ISSUED_MILLIS.compare_exchange_weak(
      last,
      candidate,
      Ordering::AcqRel,
      Ordering::Relaxed,
    ) {
      Ok(_) => return candidate,
      Err(actual) => last = actual,
    }
  }
}

fn remove_tree(path: &Path) -> Result<(), WorkspaceError> {
  match std::fs::remove_dir_all(path) {
    Ok(()) => {
      info!("已清理目录: {}", path.display());
      Ok(())
    }
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
    Err(source) => Err(WorkspaceError::Reset {
      path: path.to_path_buf(),
      source,
    }),
  }
}

/// 工作区：原始输出目录、发布目录与审计日志路径
#[derive(Debug, Clone)]
pub struct Workspace {
  config: WorkspaceConfig,
}

impl Workspace {
  pub fn new(config: WorkspaceConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &WorkspaceConfig {
    &self.config
  }

  pub fn raw_root(&self) -> &Path {
    &self.config.raw_root
  }

  pub fn publish_root(&self) -> &Path {
    &self.config.publish_root
  }

  pub fn log_path(&self) -> &Path {
    &self.config.log_path
  }

  /// 删除原始输出目录与发布目录（不存在时什么也不做）
  pub fn reset_all(&self) -> Result<(), WorkspaceError> {
    self.reset_raw()?;
    remove_tree(&self.config.publish_root)
  }

  /// 删除原始输出目录，每次检测前调用
  pub fn reset_raw(&self) -> Result<(), WorkspaceError> {
    remove_tree(&self.config.raw_root)
  }

  pub fn ensure_publish_dir(&self) -> Result<(), WorkspaceError> {
    std::fs::create_dir_all(&self.config.publish_root).map_err(|source| {
      WorkspaceError::CreateDir {
        path: self.config.publish_root.clone(),
        source,
      }
    })
  }

  /// 生成形如 `{prefix}_{epoch_millis}.{extension}` 的文件名
  pub fn unique_name(&self, prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, next_unique_millis(), extension)
  }

  /// 将原始输出复制到发布目录，返回发布路径。原始文件保留以便排查。
  pub fn publish(&self, raw_file: &Path) -> Result<PathBuf, WorkspaceError> {
    self.ensure_publish_dir()?;

    let name = self.unique_name(&self.config.result_prefix, &self.config.result_extension);
    let target = self.config.publish_root.join(name);
    std::fs::copy(raw_file, &target).map_err(|source| WorkspaceError::Copy {
      from: raw_file.to_path_buf(),
      to: target.clone(),
      source,
    })?;

    info!("发布检测结果: {}", target.display());
    Ok(target)
  }

  /// 原始输出根目录下所有以运行前缀开头的子目录
  fn candidate_run_dirs(&self) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(&self.config.raw_root) {
      Ok(entries) => entries,
      Err(_) => return Vec::new(),
    };

    entries
      .filter_map(|entry| entry.ok())
      .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
      .filter(|entry| {
        entry
          .file_name()
          .to_string_lossy()
          .starts_with(&self.config.run_prefix)
      })
      .map(|entry| entry.path())
      .collect()
  }

  /// 最近修改的运行目录；修改时间相同时取字典序最大的路径
  pub fn latest_run_dir(&self) -> Option<PathBuf> {
    self
      .candidate_run_dirs()
      .into_iter()
      .map(|path| {
        let modified = std::fs::metadata(&path)
          .and_then(|m| m.modified())
          .unwrap_or(UNIX_EPOCH);
        (modified, path)
      })
      .max()
      .map(|(_, path)| path)
  }

  /// 在超时前轮询，直到最新运行目录中出现标注图像
  pub fn locate_output(
    &self,
    settle_timeout: Duration,
    poll_interval: Duration,
  ) -> Result<PathBuf, WorkspaceError> {
    let deadline = Instant::now() + settle_timeout;

    loop {
      let latest = self.latest_run_dir();
      if let Some(dir) = &latest {
        let file = dir.join(&self.config.raw_image_name);
        if file.is_file() {
          debug!("定位到检测输出: {}", file.display());
          return Ok(file);
        }
      }

      if Instant::now() >= deadline {
        return match latest {
          None => {
            warn!("未找到检测输出目录: {}", self.config.raw_root.display());
            Err(WorkspaceError::NoOutputFound(self.config.raw_root.clone()))
          }
          Some(dir) => {
            let file = dir.join(&self.config.raw_image_name);
            warn!("检测输出图像缺失: {}", file.display());
            Err(WorkspaceError::OutputFileMissing(file))
          }
        };
      }

      std::thread::sleep(poll_interval);
    }
  }
}
