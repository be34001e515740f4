// 该文件是 Tanlei （探雷） 项目的一部分。
// src/model/replay.rs - 回放检测结果
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Detection, Model, ModelError, RawDetection},
};

/// 对每张图像都返回同一组预先录制的检测结果，用于演示与联调
pub struct ReplayModel {
  detections: Vec<RawDetection>,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::SchemeMismatch(format!(
        "期望模型方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    info!("加载回放检测结果: {}", url.path());
    let data = std::fs::read(url.path())?;
    let detections: Vec<RawDetection> = serde_json::from_slice(&data)?;
    debug!("回放检测结果数量: {}", detections.len());

    Ok(ReplayModel { detections })
  }
}

impl ReplayModel {
  pub fn new(detections: Vec<RawDetection>) -> Self {
    Self { detections }
  }
}

impl Model for ReplayModel {
  type Error = ModelError;

  fn infer(&self, image: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
    self
      .detections
      .iter()
      .cloned()
      .map(|raw| raw.into_detection(image.width(), image.height()))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn replays_file_for_every_image() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("detections.json");
    std::fs::write(
      &path,
      r#"[{"label":"satm","confidence":0.9},{"label":"sapem","confidence":0.4}]"#,
    )
    .unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&format!("replay://{}", url.path())).unwrap();
    let model = ReplayModel::from_url(&url).unwrap();

    for _ in 0..2 {
      let dets = model.infer(&RgbImage::new(4, 4)).unwrap();
      let labels: Vec<_> = dets.iter().map(|d| d.label.as_str()).collect();
      assert_eq!(labels, vec!["satm", "sapem"]);
    }
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("exec:///bin/true").unwrap();
    assert!(matches!(
      ReplayModel::from_url(&url),
      Err(ModelError::SchemeMismatch(_))
    ));
  }
}
