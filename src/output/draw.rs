// 该文件是 Tanlei （探雷） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use crate::model::Detection;
#[cfg(feature = "draw_detections")]
use crate::model::MINE_LABELS;
#[cfg(feature = "draw_detections")]
use crate::output::OutputError;

#[cfg(feature = "draw_detections")]
use ab_glyph::{FontVec, PxScale};
#[cfg(feature = "draw_detections")]
use image::Rgb;
#[cfg(feature = "draw_detections")]
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;

// 按 MINE_LABELS 顺序：SATM 红色，SAPEM 橙色；其他类别蓝色
const LABEL_COLORS: [[u8; 3]; 2] = [[255, 0, 0], [255, 160, 0]];
const OTHER_COLOR: [u8; 3] = [0, 0, 255];

/// 在图像上绘制检测框；配置字体后同时绘制类别与置信度标签
#[derive(Default)]
pub struct Draw {
  #[cfg(feature = "draw_detections")]
  font: Option<FontVec>,
}

impl Draw {
  #[cfg(feature = "draw_detections")]
  pub fn with_font_file(path: &std::path::Path) -> Result<Self, OutputError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)
      .map_err(|e| OutputError::FontError(format!("{}: {}", path.display(), e)))?;
    Ok(Self { font: Some(font) })
  }

  #[cfg(feature = "draw_detections")]
  fn color_of(label: &str) -> [u8; 3] {
    MINE_LABELS
      .iter()
      .position(|known| known.eq_ignore_ascii_case(label))
      .map(|idx| LABEL_COLORS[idx])
      .unwrap_or(OTHER_COLOR)
  }

  #[cfg(feature = "draw_detections")]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, det: &Detection) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w < 1.0 || h < 1.0 {
      return;
    }

    let x_min = ((det.bbox[0] * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((det.bbox[1] * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((det.bbox[2] * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((det.bbox[3] * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Rgb(Self::color_of(&det.label));

    // 边框加粗
    for t in 0..BOX_THICKNESS {
      let width = (x_max - x_min - 2 * t + 1).max(0) as u32;
      let height = (y_max - y_min - 2 * t + 1).max(0) as u32;
      if width == 0 || height == 0 {
        break;
      }
      draw_hollow_rect_mut(image, Rect::at(x_min + t, y_min + t).of_size(width, height), color);
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", det.label.to_uppercase(), det.confidence);
    let text_width = (label.len() as f32 * LABEL_CHAR_WIDTH) as i32;

    // 标签放在边框上方，空间不足时贴着图像上沿
    let label_x = x_min;
    let label_y = (y_min - LABEL_TEXT_HEIGHT).max(0);
    let label_width = text_width.min(w as i32 - label_x).max(0) as u32;

    if label_width > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, LABEL_TEXT_HEIGHT as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb([255u8, 255u8, 255u8]),
        label_x,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        PxScale::from(LABEL_FONT_SIZE),
        font,
        &label,
      );
    }
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &[Detection]) {
    #[cfg(feature = "draw_detections")]
    for det in result {
      self.draw_bbox_with_label(image, det);
    }

    #[cfg(not(feature = "draw_detections"))]
    let _ = (image, result);
  }
}
