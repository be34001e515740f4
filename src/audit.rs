// 该文件是 Tanlei （探雷） 项目的一部分。
// src/audit.rs - 检测审计日志
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

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::Detection;

pub const LOG_HEADER: [&str; 3] = ["timestamp", "class", "confidence"];
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const NONE_CLASS: &str = "None";
pub const NONE_CONFIDENCE: &str = "-";

#[derive(Error, Debug)]
pub enum LogError {
  #[error("写入检测日志失败: {path}: {source}")]
  WriteFailed {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("删除检测日志失败: {path}: {source}")]
  RemoveFailed {
    path: PathBuf,
    source: std::io::Error,
  },
}

fn csv_field(field: &str) -> String {
  if field.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", field.replace('"', "\"\""))
  } else {
    field.to_string()
  }
}

fn csv_row(fields: &[&str]) -> String {
  let mut row = fields
    .iter()
    .map(|f| csv_field(f))
    .collect::<Vec<_>>()
    .join(",");
  row.push_str("\r\n");
  row
}

/// 仅追加的 CSV 审计日志，每次检测写入一条记录
#[derive(Debug, Clone)]
pub struct AuditLogger {
  path: PathBuf,
}

impl AuditLogger {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  /// 组装一次检测的全部行；无检测时写入哨兵行 `None,-`
  pub fn format_record(timestamp: &DateTime<Local>, detections: &[Detection]) -> String {
    let ts = timestamp.format(LOG_TIMESTAMP_FORMAT).to_string();

    if detections.is_empty() {
      return csv_row(&[ts.as_str(), NONE_CLASS, NONE_CONFIDENCE]);
    }

    detections
      .iter()
      .map(|det| {
        let label = det.label.to_uppercase();
        let confidence = format!("{:.4}", det.confidence);
        csv_row(&[ts.as_str(), label.as_str(), confidence.as_str()])
      })
      .collect()
  }

  pub fn append(
    &self,
    timestamp: &DateTime<Local>,
    detections: &[Detection],
  ) -> Result<(), LogError> {
    let write_failed = |source| LogError::WriteFailed {
      path: self.path.clone(),
      source,
    };

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .map_err(write_failed)?;

    // 以文件长度判断是否需要表头，覆盖文件存在但为空的情况
    let is_empty = file.metadata().map_err(write_failed)?.len() == 0;

    let mut record = String::new();
    if is_empty {
      debug!("创建检测日志: {}", self.path.display());
      record.push_str(&csv_row(&LOG_HEADER));
    }
    record.push_str(&Self::format_record(timestamp, detections));

    file.write_all(record.as_bytes()).map_err(write_failed)?;
    file.flush().map_err(write_failed)?;

    info!(
      "检测日志已追加 {} 行: {}",
      detections.len().max(1),
      self.path.display()
    );
    Ok(())
  }

  /// 删除日志文件，文件不存在时静默返回
  pub fn reset_log(&self) -> Result<(), LogError> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => {
        info!("已删除检测日志: {}", self.path.display());
        Ok(())
      }
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(source) => {
        warn!("删除检测日志失败: {}: {}", self.path.display(), source);
        Err(LogError::RemoveFailed {
          path: self.path.clone(),
          source,
        })
      }
    }
  }
}
