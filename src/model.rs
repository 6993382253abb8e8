// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/model.rs - 检测模型
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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// 置信度阈值（百分比）
pub const DEFAULT_CONFIDENCE: u8 = 15;
/// 重叠（IoU）阈值（百分比）
pub const DEFAULT_OVERLAP: u8 = 30;

/// 检测模型接口。实现方读取 `image` 路径上的 JPEG 文件。
#[async_trait]
pub trait Model: Send + Sync {
  async fn infer(
    &self,
    image: &Path,
    params: &PredictParams,
  ) -> Result<DetectResult, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictParams {
  pub confidence: u8,
  pub overlap: u8,
}

impl Default for PredictParams {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      overlap: DEFAULT_OVERLAP,
    }
  }
}

/// 单个检测结果，`x`/`y` 为框中心的像素坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
  pub confidence: f64,
  pub class: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub class_id: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub detection_id: Option<String>,
  /// 服务端返回的其余字段，原样透传
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Prediction {
  pub fn new(class: impl Into<String>, confidence: f64, center: (f64, f64), size: (f64, f64)) -> Self {
    Self {
      x: center.0,
      y: center.1,
      width: size.0,
      height: size.1,
      confidence,
      class: class.into(),
      class_id: None,
      detection_id: None,
      extra: Map::new(),
    }
  }

  /// [x_min, y_min, x_max, y_max]
  pub fn bbox(&self) -> [f64; 4] {
    let half_w = self.width / 2.0;
    let half_h = self.height / 2.0;
    [
      self.x - half_w,
      self.y - half_h,
      self.x + half_w,
      self.y + half_h,
    ]
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectResult {
  #[serde(default)]
  pub predictions: Vec<Prediction>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl DetectResult {
  pub fn from_predictions(predictions: Vec<Prediction>) -> Self {
    Self {
      predictions,
      extra: Map::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.predictions.is_empty()
  }

  pub fn len(&self) -> usize {
    self.predictions.len()
  }

  pub fn labels(&self) -> Vec<String> {
    self.predictions.iter().map(|p| p.class.clone()).collect()
  }
}

#[derive(Error, Debug)]
pub enum ProviderError {
  #[error("请求检测服务失败: {0}")]
  Request(#[from] reqwest::Error),
  #[error("检测服务超时")]
  Timeout,
  #[error("检测服务返回错误 ({status}): {body}")]
  Api { status: u16, body: String },
  #[error("检测结果解析失败: {0}")]
  Decode(#[from] serde_json::Error),
  #[error("读取待检测图像失败: {0}")]
  Io(#[from] std::io::Error),
}

impl ProviderError {
  pub fn from_reqwest(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ProviderError::Timeout
    } else {
      ProviderError::Request(err)
    }
  }
}

mod roboflow;
pub use self::roboflow::{DEFAULT_DETECT_ENDPOINT, Roboflow, RoboflowBuilder, RoboflowError};
