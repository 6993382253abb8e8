// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/artifact.rs - 图像产物管理
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

use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;

mod store;
mod temp;

pub use self::store::{ANNOTATED_DIR, ArtifactStore, mime_for};
pub use self::temp::{TEMP_PREFIX, TempArtifact};

const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum ArtifactError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("产物不存在: {0}")]
  NotFound(String),
}

/// 将 RGB 图像编码为 JPEG 字节
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, ArtifactError> {
  let mut buffer = Vec::new();
  JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(image)?;
  Ok(buffer)
}
