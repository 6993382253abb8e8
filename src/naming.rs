// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/naming.rs - 产物命名
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

use sha2::{Digest, Sha256};

/// 产物命名策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum NamingStrategy {
  /// 对上传图像字节取 SHA-256，相同图像得到相同名称
  #[default]
  ContentDigest,
  /// 对 `<文件名>_<Unix 秒>` 取 SHA-256，同一秒内同名文件会冲突
  FilenameTimestamp,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HashNamer {
  strategy: NamingStrategy,
}

impl HashNamer {
  pub fn new(strategy: NamingStrategy) -> Self {
    Self { strategy }
  }

  pub fn strategy(&self) -> NamingStrategy {
    self.strategy
  }

  /// 生成 64 位小写十六进制名称
  pub fn name(&self, filename: &str, bytes: &[u8]) -> String {
    match self.strategy {
      NamingStrategy::ContentDigest => content_digest(bytes),
      NamingStrategy::FilenameTimestamp => {
        filename_timestamp_digest(filename, chrono::Utc::now().timestamp())
      }
    }
  }
}

pub fn content_digest(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

pub fn filename_timestamp_digest(filename: &str, unix_secs: i64) -> String {
  let combined = format!("{}_{}", filename, unix_secs);
  hex::encode(Sha256::digest(combined.as_bytes()))
}
