// 该文件是 Tanlei （探雷） 项目的一部分。
// src/detector.rs - 面向操作界面的检测入口
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

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info};

use crate::{
  audit::LogError,
  config::PipelineConfig,
  pipeline::{Pipeline, PipelineError},
  source::DetectionSource,
  workspace::{Workspace, WorkspaceError},
};

pub const ERROR_PREFIX: &str = "❌ Error: ";
pub const LOG_WARNING_PREFIX: &str = "⚠️ Warning: ";

#[derive(Error, Debug)]
pub enum StartupError {
  #[error("启动清理工作区失败: {0}")]
  Workspace(#[from] WorkspaceError),
  #[error("启动清理检测日志失败: {0}")]
  Log(#[from] LogError),
}

/// `detect` 返回给界面的内容：结果图像路径（失败时为空）与摘要文本
#[derive(Debug, Clone, PartialEq)]
pub struct DetectOutcome {
  pub result_path: Option<PathBuf>,
  pub summary: String,
}

/// 操作界面调用的三个入口：`detect`、`clear`、`fetch_log`
pub struct MineDetector<S> {
  pipeline: Pipeline<S>,
}

impl<S: DetectionSource> MineDetector<S> {
  /// 创建检测器并执行启动清理：原始输出目录、发布目录与日志文件全部删除
  pub fn start(
    source: S,
    workspace: Workspace,
    config: PipelineConfig,
  ) -> Result<Self, StartupError> {
    let pipeline = Pipeline::new(source, workspace, config);
    pipeline.workspace().reset_all()?;
    pipeline.logger().reset_log()?;
    info!("启动清理完成");
    Ok(Self { pipeline })
  }

  pub fn workspace(&self) -> &Workspace {
    self.pipeline.workspace()
  }

  /// 发布前的失败转为错误摘要；检测源本身的失败原样返回
  pub fn detect(&mut self, image: &RgbImage) -> Result<DetectOutcome, PipelineError> {
    match self.pipeline.run(image) {
      Ok(run) => {
        let mut summary = run.summary;
        if let Some(warning) = run.log_warning {
          summary.push('\n');
          summary.push_str(LOG_WARNING_PREFIX);
          summary.push_str(&warning.to_string());
        }
        Ok(DetectOutcome {
          result_path: Some(run.result_image_path),
          summary,
        })
      }
      Err(e) if e.is_fatal() => {
        error!("检测源失败: {}", e);
        Err(e)
      }
      Err(e) => {
        error!("检测失败: {}", e);
        Ok(DetectOutcome {
          result_path: None,
          summary: format!("{}{}", ERROR_PREFIX, e),
        })
      }
    }
  }

  /// 清理原始输出目录与发布目录；审计日志保留到下次启动
  pub fn clear(&self) -> Result<(), WorkspaceError> {
    self.pipeline.workspace().reset_all()
  }

  pub fn fetch_log(&self) -> Option<PathBuf> {
    let logger = self.pipeline.logger();
    logger.exists().then(|| logger.path().to_path_buf())
  }
}
