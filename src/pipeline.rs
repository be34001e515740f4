// 该文件是 Tanlei （探雷） 项目的一部分。
// src/pipeline.rs - 检测结果流水线
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

use std::fmt::Write;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  audit::{AuditLogger, LogError},
  config::PipelineConfig,
  model::Detection,
  source::{BoxError, DetectionSource},
  workspace::{Workspace, WorkspaceError},
};

pub const NO_DETECTION_MESSAGE: &str = "✅ No SATM or SAPEM landmines detected in the image.";
pub const ALERT_HEADER: &str = "🚨 Landmine(s) detected:";

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("No detection output found.")]
  NoOutputFound,
  #[error("Output image missing.")]
  OutputFileMissing(PathBuf),
  #[error("Workspace reset failed: {0}")]
  Workspace(#[source] WorkspaceError),
  #[error("Publishing result failed: {0}")]
  Publish(#[source] WorkspaceError),
  #[error("Detection source failed: {0}")]
  Source(#[source] BoxError),
}

impl PipelineError {
  /// 检测源自身的错误不做处理，由调用方终止本次操作
  pub fn is_fatal(&self) -> bool {
    matches!(self, PipelineError::Source(_))
  }
}

/// 一次检测运行的结果
#[derive(Debug)]
pub struct DetectionRun {
  pub result_image_path: PathBuf,
  pub detections: Vec<Detection>,
  pub timestamp: DateTime<Local>,
  pub summary: String,
  /// 日志写入失败不影响结果，仅作为警告上报
  pub log_warning: Option<LogError>,
}

/// 生成面向操作员的检测摘要
pub fn summarize(detections: &[Detection]) -> String {
  if detections.is_empty() {
    return NO_DETECTION_MESSAGE.to_string();
  }

  let mut summary = String::from(ALERT_HEADER);
  for det in detections {
    let _ = write!(
      summary,
      "\n- {} ({:.1}%)",
      det.label.to_uppercase(),
      f64::from(det.confidence) * 100.0
    );
  }
  summary
}

pub struct Pipeline<S> {
  source: S,
  workspace: Workspace,
  logger: AuditLogger,
  config: PipelineConfig,
}

impl<S: DetectionSource> Pipeline<S> {
  pub fn new(source: S, workspace: Workspace, config: PipelineConfig) -> Self {
    let logger = AuditLogger::new(workspace.log_path());
    Self {
      source,
      workspace,
      logger,
      config,
    }
  }

  pub fn workspace(&self) -> &Workspace {
    &self.workspace
  }

  pub fn logger(&self) -> &AuditLogger {
    &self.logger
  }

  pub fn run(&mut self, image: &RgbImage) -> Result<DetectionRun, PipelineError> {
    // 清空原始输出目录，保证之后只存在本次运行的子目录
    self.workspace.reset_raw().map_err(PipelineError::Workspace)?;

    let detections = self
      .source
      .detect(image)
      .map_err(|e| PipelineError::Source(Box::new(e)))?;

    let raw_output = self
      .workspace
      .locate_output(self.config.settle_timeout, self.config.poll_interval)
      .map_err(|e| match e {
        WorkspaceError::NoOutputFound(_) => PipelineError::NoOutputFound,
        WorkspaceError::OutputFileMissing(path) => PipelineError::OutputFileMissing(path),
        other => PipelineError::Workspace(other),
      })?;

    let result_image_path = self
      .workspace
      .publish(&raw_output)
      .map_err(PipelineError::Publish)?;

    let summary = summarize(&detections);

    let timestamp = Local::now();
    let log_warning = match self.logger.append(&timestamp, &detections) {
      Ok(()) => None,
      Err(e) => {
        warn!("{}", e);
        Some(e)
      }
    };

    info!(
      "检测完成: {} 个目标, 结果: {}",
      detections.len(),
      result_image_path.display()
    );

    Ok(DetectionRun {
      result_image_path,
      detections,
      timestamp,
      summary,
      log_warning,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(label: &str, confidence: f32) -> Detection {
    Detection {
      label: label.to_string(),
      confidence,
      bbox: [0.0; 4],
    }
  }

  #[test]
  fn empty_summary_is_fixed_message() {
    assert_eq!(summarize(&[]), NO_DETECTION_MESSAGE);
  }

  #[test]
  fn summary_lines_follow_emission_order() {
    let summary = summarize(&[det("satm", 0.8234), det("Sapem", 0.5)]);
    assert_eq!(
      summary,
      "🚨 Landmine(s) detected:\n- SATM (82.3%)\n- SAPEM (50.0%)"
    );
  }

  #[test]
  fn percentage_rounds_in_double_precision() {
    assert_eq!(
      summarize(&[det("satm", 0.8775)]),
      "🚨 Landmine(s) detected:\n- SATM (87.7%)"
    );
  }

  #[test]
  fn only_source_errors_are_fatal() {
    assert!(!PipelineError::NoOutputFound.is_fatal());
    assert!(PipelineError::Source("boom".into()).is_fatal());
  }
}
