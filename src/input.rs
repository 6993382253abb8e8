// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/input.rs - 上传图像与请求参数
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

use bytes::Bytes;
use image::RgbImage;
use thiserror::Error;

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 一次请求中上传的原始图像
#[derive(Debug, Clone)]
pub struct UploadedImage {
  pub filename: String,
  pub bytes: Bytes,
}

impl UploadedImage {
  pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
    Self {
      filename: filename.into(),
      bytes: bytes.into(),
    }
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Missing field: {0}")]
  MissingCoordinate(&'static str),
  #[error("Invalid {field}: {value:?}")]
  InvalidCoordinate { field: &'static str, value: String },
  #[error("Malformed form data: {0}")]
  Multipart(String),
}

/// 按图像内容解码，格式由字节头推断
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
  Ok(image::load_from_memory(bytes)?.to_rgb8())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
  pub latitude: f64,
  pub longitude: f64,
}

impl Coordinates {
  pub fn parse(latitude: Option<&str>, longitude: Option<&str>) -> Result<Self, InputError> {
    Ok(Self {
      latitude: parse_coordinate("latitude", latitude)?,
      longitude: parse_coordinate("longitude", longitude)?,
    })
  }
}

fn parse_coordinate(field: &'static str, raw: Option<&str>) -> Result<f64, InputError> {
  let raw = raw
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or(InputError::MissingCoordinate(field))?;
  raw
    .parse::<f64>()
    .ok()
    .filter(|v| v.is_finite())
    .ok_or_else(|| InputError::InvalidCoordinate {
      field,
      value: raw.to_string(),
    })
}
