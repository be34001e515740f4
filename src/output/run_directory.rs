// 该文件是 Tanlei （探雷） 项目的一部分。
// src/output/run_directory.rs - 按运行编号的目录输出
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

use image::RgbImage;
use tracing::debug;

use crate::{
  config::WorkspaceConfig,
  model::Detection,
  output::{OutputError, Render, draw::Draw},
};

/// 每次渲染在根目录下新建 `exp`、`exp2`、`exp3` …… 并写入一张标注图像
pub struct RunDirectoryOutput {
  root: PathBuf,
  run_prefix: String,
  image_name: String,
  draw: Draw,
}

impl RunDirectoryOutput {
  pub fn new(root: impl Into<PathBuf>, run_prefix: &str, image_name: &str) -> Self {
    Self {
      root: root.into(),
      run_prefix: run_prefix.to_string(),
      image_name: image_name.to_string(),
      draw: Draw::default(),
    }
  }

  pub fn for_workspace(config: &WorkspaceConfig) -> Self {
    Self::new(config.raw_root.clone(), &config.run_prefix, &config.raw_image_name)
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// 第一个不存在的运行目录名
  fn next_run_dir(&self) -> PathBuf {
    let first = self.root.join(&self.run_prefix);
    if !first.exists() {
      return first;
    }

    (2u32..)
      .map(|n| self.root.join(format!("{}{}", self.run_prefix, n)))
      .find(|dir| !dir.exists())
      .unwrap_or(first)
  }
}

impl Render for RunDirectoryOutput {
  type Error = OutputError;

  fn render_result(&self, image: &RgbImage, result: &[Detection]) -> Result<PathBuf, Self::Error> {
    let directory = self.next_run_dir();
    std::fs::create_dir_all(&directory)?;

    let mut annotated = image.clone();
    self.draw.draw_detections(&mut annotated, result);

    let path = directory.join(&self.image_name);
    annotated.save(&path)?;
    debug!("标注图像已保存: {}", path.display());

    Ok(path)
  }
}
