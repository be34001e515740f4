// 该文件是 Tanlei （探雷） 项目的一部分。
// src/source.rs - 检测源
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
use thiserror::Error;
use tracing::{debug, info};

use crate::{model::Detection, model::Model, output::Render};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 检测源：推理得到检测结果，并把一张标注图像写入其输出区域。
///
/// 返回时标注图像应已写完或即将可见，流水线会在有限时间内轮询等待。
pub trait DetectionSource {
  type Error: std::error::Error + Send + Sync + 'static;

  fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum SourceError {
  #[error("模型推理错误: {0}")]
  Model(#[source] BoxError),
  #[error("渲染错误: {0}")]
  Render(#[source] BoxError),
}

/// 由模型与渲染输出组合而成的检测源
pub struct RenderedSource<M, R> {
  model: M,
  render: R,
  min_confidence: f32,
}

impl<M, R> RenderedSource<M, R> {
  pub fn new(model: M, render: R) -> Self {
    Self {
      model,
      render,
      min_confidence: 0.0,
    }
  }

  /// 低于该置信度的检测结果在进入流水线前被丢弃
  pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = min_confidence;
    self
  }
}

impl<M, R, ME, RE> DetectionSource for RenderedSource<M, R>
where
  ME: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  M: Model<Error = ME>,
  R: Render<Error = RE>,
{
  type Error = SourceError;

  fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
    let now = std::time::Instant::now();
    let mut detections = self
      .model
      .infer(image)
      .map_err(|e| SourceError::Model(Box::new(e)))?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let before = detections.len();
    detections.retain(|det| det.confidence >= self.min_confidence);
    if detections.len() != before {
      debug!(
        "按置信度阈值 {} 过滤掉 {} 个目标",
        self.min_confidence,
        before - detections.len()
      );
    }

    let path = self
      .render
      .render_result(image, &detections)
      .map_err(|e| SourceError::Render(Box::new(e)))?;
    debug!("检测源输出: {}", path.display());

    Ok(detections)
  }
}
