// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/artifact/store.rs - 标注图像存储
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

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info};

use super::{ArtifactError, encode_jpeg};

/// 标注图像在静态目录下的子目录名
pub const ANNOTATED_DIR: &str = "annotated_images";

const STAGING_PREFIX: &str = ".staging_";

/// 标注图像目录。所有读写都限制在 `root` 之内。
#[derive(Debug, Clone)]
pub struct ArtifactStore {
  root: PathBuf,
}

impl ArtifactStore {
  pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
    let root = root.into();
    std::fs::create_dir_all(&root)?;
    info!("标注图像目录: {}", root.display());
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn output_name(hash: &str) -> String {
    format!("{}.jpg", hash)
  }

  /// 将名称解析为目录内的路径，拒绝任何可能逃出目录的名称。
  /// 以 `.` 开头的名称是写入中的暂存文件，同样不可见。
  pub fn resolve(&self, name: &str) -> Result<PathBuf, ArtifactError> {
    if name.starts_with('.') || name.contains(['/', '\\']) {
      return Err(ArtifactError::NotFound(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
      (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
      _ => Err(ArtifactError::NotFound(name.to_string())),
    }
  }

  /// 编码并保存标注图像。先写入同目录临时文件再原子重命名。
  pub fn persist_image(&self, name: &str, image: &RgbImage) -> Result<PathBuf, ArtifactError> {
    let path = self.resolve(name)?;
    let encoded = encode_jpeg(image)?;

    let mut staging = tempfile::Builder::new()
      .prefix(STAGING_PREFIX)
      .tempfile_in(&self.root)?;
    staging.write_all(&encoded)?;
    staging.flush()?;
    staging
      .persist(&path)
      .map_err(|e| ArtifactError::IoError(e.error))?;

    info!("保存标注图像: {}", path.display());
    Ok(path)
  }

  pub async fn fetch(&self, name: &str) -> Result<(Vec<u8>, &'static str), ArtifactError> {
    let path = self.existing_file(name).await?;
    let bytes = tokio::fs::read(&path)
      .await
      .map_err(|e| not_found_or_io(name, e))?;
    debug!("读取标注图像: {} ({} 字节)", path.display(), bytes.len());
    Ok((bytes, mime_for(name)))
  }

  pub async fn delete(&self, name: &str) -> Result<(), ArtifactError> {
    let path = self.existing_file(name).await?;
    tokio::fs::remove_file(&path)
      .await
      .map_err(|e| not_found_or_io(name, e))?;
    info!("删除标注图像: {}", path.display());
    Ok(())
  }

  async fn existing_file(&self, name: &str) -> Result<PathBuf, ArtifactError> {
    let path = self.resolve(name)?;
    match tokio::fs::metadata(&path).await {
      Ok(meta) if meta.is_file() => Ok(path),
      Ok(_) => Err(ArtifactError::NotFound(name.to_string())),
      Err(e) => Err(not_found_or_io(name, e)),
    }
  }
}

fn not_found_or_io(name: &str, err: std::io::Error) -> ArtifactError {
  if err.kind() == ErrorKind::NotFound {
    ArtifactError::NotFound(name.to_string())
  } else {
    ArtifactError::IoError(err)
  }
}

/// `.jpg`/`.jpeg` 为 JPEG，其余一律按 PNG 返回
pub fn mime_for(name: &str) -> &'static str {
  let extension = Path::new(name)
    .extension()
    .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
  match extension.as_deref() {
    Some("jpg") | Some("jpeg") => "image/jpeg",
    _ => "image/png",
  }
}
