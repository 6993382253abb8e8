// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/bin/oneshot.rs - 单张图像检测
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use qingjie::{FromUrl, args::ModelArgs, artifact::ArtifactStore, input::ImageFileInput};

/// 对单张本地图像执行检测并保存标注结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，形如 image:///path/to/dog.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 标注图像输出目录
  #[arg(long, default_value = "static/annotated_images", value_name = "DIR")]
  pub output: PathBuf,

  #[command(flatten)]
  pub model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出目录: {}", args.output.display());
  info!("检测模型: {}", args.model.model);

  let upload = ImageFileInput::from_url(&args.input)
    .with_context(|| format!("无法读取输入: {}", args.input))?
    .into_upload();
  let store = ArtifactStore::open(&args.output)
    .with_context(|| format!("无法创建输出目录: {}", args.output.display()))?;
  let task = args.model.build_task(store, std::env::temp_dir())?;

  info!("开始推理...");
  let detection = task.run(Some(upload)).await?;
  info!(
    "标注图像: {}",
    task.store().root().join(&detection.artifact).display()
  );

  println!("{}", serde_json::to_string_pretty(&detection.result)?);
  Ok(())
}
