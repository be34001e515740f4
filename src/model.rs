// 该文件是 Tanlei （探雷） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(any(feature = "model_command", feature = "model_replay"))]
use crate::FromUrlWithScheme;

/// 地雷类别词表
pub const MINE_LABELS: [&str; 2] = ["SATM", "SAPEM"];

pub trait Model {
  type Error;

  fn infer(&self, image: &RgbImage) -> Result<Vec<Detection>, Self::Error>;
}

/// 一个检测目标
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub label: String,
  pub confidence: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测结果解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("检测结果无效: {0}")]
  InvalidDetection(String),
  #[error("外部检测程序执行失败: {0}")]
  CommandFailed(String),
}

/// 外部检测器输出的一条结果
///
/// 同时接受 `{label, confidence, bbox}` 与 YOLOv5 `pandas().xyxy` 风格的
/// `{name, confidence, xmin, ymin, xmax, ymax}`。
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
  #[serde(alias = "name")]
  pub label: String,
  pub confidence: f32,
  #[serde(default)]
  pub bbox: Option<[f32; 4]>,
  #[serde(default)]
  pub xmin: Option<f32>,
  #[serde(default)]
  pub ymin: Option<f32>,
  #[serde(default)]
  pub xmax: Option<f32>,
  #[serde(default)]
  pub ymax: Option<f32>,
}

impl RawDetection {
  /// 转为强类型检测结果；坐标超过 1 时视为像素坐标并按图像尺寸归一化
  pub fn into_detection(self, width: u32, height: u32) -> Result<Detection, ModelError> {
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(ModelError::InvalidDetection(format!(
        "置信度超出范围: {} ({})",
        self.confidence, self.label
      )));
    }

    let bbox = match (self.bbox, self.xmin, self.ymin, self.xmax, self.ymax) {
      (Some(bbox), ..) => bbox,
      (None, Some(x0), Some(y0), Some(x1), Some(y1)) => [x0, y0, x1, y1],
      _ => [0.0; 4],
    };

    let bbox = if bbox.iter().any(|v| *v > 1.0) {
      let (w, h) = (width.max(1) as f32, height.max(1) as f32);
      [bbox[0] / w, bbox[1] / h, bbox[2] / w, bbox[3] / h]
    } else {
      bbox
    };

    Ok(Detection {
      label: self.label,
      confidence: self.confidence,
      bbox: bbox.map(|v| v.clamp(0.0, 1.0)),
    })
  }
}

pub fn parse_detections(
  json: &[u8],
  width: u32,
  height: u32,
) -> Result<Vec<Detection>, ModelError> {
  let raw: Vec<RawDetection> = serde_json::from_slice(json)?;
  raw
    .into_iter()
    .map(|r| r.into_detection(width, height))
    .collect()
}

#[cfg(feature = "model_command")]
mod command;
#[cfg(feature = "model_command")]
pub use self::command::CommandModel;

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::ReplayModel;

pub enum ModelWrapper {
  #[cfg(feature = "model_command")]
  Command(CommandModel),
  #[cfg(feature = "model_replay")]
  Replay(ReplayModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "model_command")]
      CommandModel::SCHEME => Ok(ModelWrapper::Command(CommandModel::from_url(url)?)),
      #[cfg(feature = "model_replay")]
      ReplayModel::SCHEME => Ok(ModelWrapper::Replay(ReplayModel::from_url(url)?)),
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Model for ModelWrapper {
  type Error = ModelError;

  fn infer(&self, image: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
    match self {
      #[cfg(feature = "model_command")]
      ModelWrapper::Command(model) => model.infer(image),
      #[cfg(feature = "model_replay")]
      ModelWrapper::Replay(model) => model.infer(image),
    }
  }
}
