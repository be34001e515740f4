// 该文件是 Tanlei （探雷） 项目的一部分。
// src/config.rs - 工作区与流水线配置
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

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RAW_ROOT: &str = "runs/detect";
pub const DEFAULT_RUN_PREFIX: &str = "exp";
pub const DEFAULT_RAW_IMAGE_NAME: &str = "image0.jpg";
pub const DEFAULT_PUBLISH_ROOT: &str = "static";
pub const DEFAULT_RESULT_PREFIX: &str = "result";
pub const DEFAULT_RESULT_EXTENSION: &str = "jpg";
pub const DEFAULT_LOG_FILE: &str = "detection_log.csv";

pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_millis(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 工作区配置
///
/// 所有路径默认相对于进程工作目录。
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
  /// 检测源原始输出根目录，每次运行在其中创建 `exp`、`exp2` ……
  pub raw_root: PathBuf,
  /// 原始输出子目录前缀
  pub run_prefix: String,
  /// 子目录中标注图像的文件名
  pub raw_image_name: String,
  /// 发布结果目录
  pub publish_root: PathBuf,
  /// 发布文件名前缀
  pub result_prefix: String,
  /// 发布文件扩展名
  pub result_extension: String,
  /// 审计日志文件
  pub log_path: PathBuf,
}

impl Default for WorkspaceConfig {
  fn default() -> Self {
    Self {
      raw_root: PathBuf::from(DEFAULT_RAW_ROOT),
      run_prefix: DEFAULT_RUN_PREFIX.to_string(),
      raw_image_name: DEFAULT_RAW_IMAGE_NAME.to_string(),
      publish_root: PathBuf::from(DEFAULT_PUBLISH_ROOT),
      result_prefix: DEFAULT_RESULT_PREFIX.to_string(),
      result_extension: DEFAULT_RESULT_EXTENSION.to_string(),
      log_path: PathBuf::from(DEFAULT_LOG_FILE),
    }
  }
}

impl WorkspaceConfig {
  /// 以 `base` 为根目录构造默认布局，测试中用于隔离工作区
  pub fn rooted_at(base: &Path) -> Self {
    Self {
      raw_root: base.join(DEFAULT_RAW_ROOT),
      publish_root: base.join(DEFAULT_PUBLISH_ROOT),
      log_path: base.join(DEFAULT_LOG_FILE),
      ..Self::default()
    }
  }
}

/// 流水线配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// 等待检测源输出文件出现的最长时间
  pub settle_timeout: Duration,
  /// 轮询间隔
  pub poll_interval: Duration,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      settle_timeout: DEFAULT_SETTLE_TIMEOUT,
      poll_interval: DEFAULT_POLL_INTERVAL,
    }
  }
}
