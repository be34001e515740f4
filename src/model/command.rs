// 该文件是 Tanlei （探雷） 项目的一部分。
// src/model/command.rs - 外部检测程序
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

use std::process::Command;

use image::RgbImage;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Detection, Model, ModelError, parse_detections},
};

/// 调用外部检测程序：图像以临时 PNG 文件路径作为最后一个参数传入，
/// 程序在标准输出打印检测结果 JSON 数组。
///
/// `exec:///opt/detector/run?arg=--weights&arg=best.pt`
pub struct CommandModel {
  program: String,
  args: Vec<String>,
}

impl FromUrlWithScheme for CommandModel {
  const SCHEME: &'static str = "exec";
}

impl FromUrl for CommandModel {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::SchemeMismatch(format!(
        "期望模型方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let args = url
      .query_pairs()
      .filter(|(k, _)| k == "arg")
      .map(|(_, v)| v.into_owned())
      .collect();

    Ok(CommandModel {
      program: url.path().to_string(),
      args,
    })
  }
}

impl CommandModel {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }
}

impl Model for CommandModel {
  type Error = ModelError;

  fn infer(&self, image: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
    let input = tempfile::Builder::new()
      .prefix("tanlei-")
      .suffix(".png")
      .tempfile()?;
    image.save(input.path())?;

    debug!("调用外部检测程序: {} {:?}", self.program, self.args);
    let now = std::time::Instant::now();
    let output = Command::new(&self.program)
      .args(&self.args)
      .arg(input.path())
      .output()?;

    if !output.status.success() {
      return Err(ModelError::CommandFailed(format!(
        "{} 退出状态 {}: {}",
        self.program,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      )));
    }

    let detections = parse_detections(&output.stdout, image.width(), image.height())?;
    info!(
      "外部检测完成，耗时: {:.2?}，检测到 {} 个目标",
      now.elapsed(),
      detections.len()
    );
    Ok(detections)
  }
}
