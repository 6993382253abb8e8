// 该文件是 Qingjie （清洁巡检） 项目的一部分。
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{info, warn};

use crate::{model::Prediction, output::Annotate};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_HEIGHT: i32 = 16;
const LABEL_CHAR_WIDTH: f32 = 9.0; // 无字体时每字符宽度（粗略估计）
const LABEL_TEXT_PADDING: i32 = 3;
const BOX_THICKNESS: u32 = 2;
const PALETTE_SIZE: usize = 20;

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONT_CANDIDATES: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/Library/Fonts/Arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 按类别取色
#[derive(Debug, Clone)]
pub struct Palette {
  colors: Vec<Rgb<u8>>,
}

impl Default for Palette {
  fn default() -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        Self::hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();
    Self { colors }
  }
}

impl Palette {
  /// HSV 转 RGB
  fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
      (c, x, 0.0)
    } else if h < 120.0 {
      (x, c, 0.0)
    } else if h < 180.0 {
      (0.0, c, x)
    } else if h < 240.0 {
      (0.0, x, c)
    } else if h < 300.0 {
      (x, 0.0, c)
    } else {
      (c, 0.0, x)
    };

    Rgb([
      ((r + m) * 255.0) as u8,
      ((g + m) * 255.0) as u8,
      ((b + m) * 255.0) as u8,
    ])
  }

  /// 有 class_id 时按 id 取色，否则按类别名取色，保证同类同色
  pub fn color_for(&self, detection: &Prediction) -> Rgb<u8> {
    let index = match detection.class_id {
      Some(id) => id as usize,
      None => detection
        .class
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize)),
    };
    self.colors[index % self.colors.len()]
  }
}

/// 将检测框换算为图像内的像素坐标 [x_min, y_min, x_max, y_max]
fn pixel_box(detection: &Prediction, width: u32, height: u32) -> Option<[i32; 4]> {
  if width == 0 || height == 0 {
    return None;
  }
  let [x0, y0, x1, y1] = detection.bbox();
  let (max_x, max_y) = (width as i32 - 1, height as i32 - 1);

  let x_min = (x0.floor() as i32).clamp(0, max_x);
  let y_min = (y0.floor() as i32).clamp(0, max_y);
  let x_max = (x1.ceil() as i32).clamp(0, max_x);
  let y_max = (y1.ceil() as i32).clamp(0, max_y);

  if x_min >= x_max || y_min >= y_max {
    return None;
  }
  Some([x_min, y_min, x_max, y_max])
}

/// 边框绘制
#[derive(Debug, Clone)]
pub struct BoxAnnotator {
  thickness: u32,
  palette: Palette,
}

impl Default for BoxAnnotator {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      palette: Palette::default(),
    }
  }
}

impl BoxAnnotator {
  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }
}

impl Annotate for BoxAnnotator {
  fn annotate(&self, scene: &mut RgbImage, detections: &[Prediction], _labels: &[String]) {
    let (width, height) = scene.dimensions();
    for detection in detections {
      let Some([x_min, y_min, x_max, y_max]) = pixel_box(detection, width, height) else {
        continue;
      };
      let color = self.palette.color_for(detection);

      // 由外向内逐层加粗
      for t in 0..self.thickness as i32 {
        let (left, top, right, bottom) = (x_min + t, y_min + t, x_max - t, y_max - t);
        if left > right || top > bottom {
          break;
        }
        let rect =
          Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(scene, rect, color);
      }
    }
  }
}

/// 标签绘制：在框的左上角上方绘制色块与白色文本
#[derive(Clone)]
pub struct LabelAnnotator {
  font: Option<FontArc>,
  scale: PxScale,
  text_color: Rgb<u8>,
  padding: i32,
  palette: Palette,
}

impl LabelAnnotator {
  pub fn new(font: Option<FontArc>) -> Self {
    Self {
      font,
      scale: PxScale::from(LABEL_FONT_SIZE),
      text_color: Rgb([255, 255, 255]),
      padding: LABEL_TEXT_PADDING,
      palette: Palette::default(),
    }
  }

  pub fn from_font_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    info!("加载标签字体: {}", path.display());
    Ok(Self::new(Some(font)))
  }

  /// 优先使用指定字体；未指定时尝试系统字体，都不可用则只绘制色块
  pub fn discover(path: Option<&Path>) -> Result<Self, DrawError> {
    if let Some(path) = path {
      return Self::from_font_file(path);
    }

    for candidate in SYSTEM_FONT_CANDIDATES.iter().map(Path::new) {
      if !candidate.is_file() {
        continue;
      }
      match Self::from_font_file(candidate) {
        Ok(annotator) => return Ok(annotator),
        Err(e) => warn!("跳过字体 {}: {}", candidate.display(), e),
      }
    }

    warn!("未找到可用字体，标签将只绘制色块");
    Ok(Self::new(None))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  fn text_size(&self, label: &str) -> (i32, i32) {
    match &self.font {
      Some(font) => {
        let (w, h) = text_size(self.scale, font, label);
        (w as i32, h as i32)
      }
      None => (
        (label.chars().count() as f32 * LABEL_CHAR_WIDTH) as i32,
        LABEL_TEXT_HEIGHT,
      ),
    }
  }
}

impl Annotate for LabelAnnotator {
  fn annotate(&self, scene: &mut RgbImage, detections: &[Prediction], labels: &[String]) {
    let (width, height) = scene.dimensions();
    for (index, detection) in detections.iter().enumerate() {
      let Some([x_min, y_min, _, _]) = pixel_box(detection, width, height) else {
        continue;
      };
      let label = labels
        .get(index)
        .map(String::as_str)
        .unwrap_or(detection.class.as_str());
      let color = self.palette.color_for(detection);

      let (text_width, text_height) = self.text_size(label);
      let tab_height = text_height + 2 * self.padding;
      let label_x = x_min;
      let label_y = (y_min - tab_height).max(0);

      // 确保标签不超出图像边界
      let tab_width = (text_width + 2 * self.padding).min(width as i32 - label_x);
      if tab_width <= 0 || tab_height <= 0 {
        continue;
      }

      let rect = Rect::at(label_x, label_y).of_size(tab_width as u32, tab_height as u32);
      draw_filled_rect_mut(scene, rect, color);

      if let Some(font) = &self.font {
        draw_text_mut(
          scene,
          self.text_color,
          label_x + self.padding,
          label_y + self.padding,
          self.scale,
          font,
          label,
        );
      }
    }
  }
}
