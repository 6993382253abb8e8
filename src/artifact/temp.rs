// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/artifact/temp.rs - 临时检测文件
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

use std::io::Write;
use std::path::Path;

use image::RgbImage;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{ArtifactError, encode_jpeg};

pub const TEMP_PREFIX: &str = "temp_";

/// 供检测服务读取的临时 JPEG 文件。
///
/// 文件名形如 `temp_<hash>_<随机串>.jpg`。调用 [`TempArtifact::release`] 或
/// 析构时删除文件。
#[derive(Debug)]
pub struct TempArtifact {
  file: NamedTempFile,
}

impl TempArtifact {
  pub fn create(work_dir: &Path, hash: &str, image: &RgbImage) -> Result<Self, ArtifactError> {
    let encoded = encode_jpeg(image)?;

    let mut file = tempfile::Builder::new()
      .prefix(&format!("{}{}_", TEMP_PREFIX, hash))
      .suffix(".jpg")
      .rand_bytes(6)
      .tempfile_in(work_dir)?;
    file.write_all(&encoded)?;
    file.flush()?;

    debug!(
      "写入临时文件: {} ({} 字节)",
      file.path().display(),
      encoded.len()
    );
    Ok(Self { file })
  }

  pub fn path(&self) -> &Path {
    self.file.path()
  }

  /// 立即删除临时文件，删除失败时返回错误
  pub fn release(self) -> Result<(), ArtifactError> {
    let path = self.file.path().to_path_buf();
    self.file.close()?;
    debug!("已删除临时文件: {}", path.display());
    Ok(())
  }
}
