// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use crate::{
  FromUrl,
  artifact::{ANNOTATED_DIR, ArtifactStore},
  model::{DEFAULT_DETECT_ENDPOINT, RoboflowBuilder},
  naming::{HashNamer, NamingStrategy},
  output::{BoxAnnotator, LabelAnnotator},
  server::DEFAULT_MAX_UPLOAD_BYTES,
  task::DetectTask,
  telemetry::{DisabledTelemetry, HttpTelemetry, TelemetrySink},
};

/// 检测模型与标注相关参数
#[derive(clap::Args, Debug, Clone)]
pub struct ModelArgs {
  /// 检测模型地址，形如 roboflow://<项目>/<版本>
  #[arg(
    long,
    env = "QINGJIE_MODEL",
    default_value = "roboflow://fake-dog-poop/1",
    value_name = "MODEL"
  )]
  pub model: Url,

  /// 托管推理服务的 API Key
  #[arg(long, env = "API_KEY", hide_env_values = true, value_name = "KEY")]
  pub api_key: String,

  /// 托管推理服务地址
  #[arg(
    long,
    env = "QINGJIE_DETECT_ENDPOINT",
    default_value = DEFAULT_DETECT_ENDPOINT,
    value_name = "URL"
  )]
  pub detect_endpoint: String,

  /// 检测服务超时（秒）
  #[arg(long, env = "QINGJIE_PROVIDER_TIMEOUT", default_value = "30", value_name = "SECS")]
  pub provider_timeout_secs: u64,

  /// 标签字体文件（TTF/OTF），不指定时尝试系统字体
  #[arg(long, env = "QINGJIE_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 产物命名策略
  #[arg(
    long,
    env = "QINGJIE_NAMING",
    value_enum,
    default_value_t = NamingStrategy::ContentDigest
  )]
  pub naming: NamingStrategy,
}

impl ModelArgs {
  /// 按参数组装检测任务，`work_dir` 存放临时文件
  pub fn build_task(&self, store: ArtifactStore, work_dir: PathBuf) -> Result<DetectTask> {
    let model = RoboflowBuilder::from_url(&self.model)
      .with_context(|| format!("无法解析模型地址: {}", self.model))?
      .api_key(self.api_key.clone())
      .endpoint(self.detect_endpoint.clone())
      .build()
      .context("无法创建检测模型客户端")?;

    let label_annotator =
      LabelAnnotator::discover(self.font.as_deref()).context("无法加载标签字体")?;

    let task = DetectTask::builder(Arc::new(model), store)
      .box_annotator(Arc::new(BoxAnnotator::default()))
      .label_annotator(Arc::new(label_annotator))
      .work_dir(work_dir)
      .namer(HashNamer::new(self.naming))
      .timeout(Duration::from_secs(self.provider_timeout_secs))
      .build()
      .context("无法创建临时文件目录")?;
    Ok(task)
  }
}

/// Qingjie 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
  /// 监听地址
  #[arg(long, env = "QINGJIE_BIND", default_value = "127.0.0.1:5000", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 静态目录，临时文件放在此处，标注图像放在其下的 annotated_images
  #[arg(long, env = "QINGJIE_STATIC_DIR", default_value = "static", value_name = "DIR")]
  pub static_dir: PathBuf,

  /// 位置事件上报地址，不指定则不上报
  #[arg(long, env = "QINGJIE_TELEMETRY_URL", value_name = "URL")]
  pub telemetry_url: Option<Url>,

  /// 位置事件上报超时（秒）
  #[arg(long, env = "QINGJIE_TELEMETRY_TIMEOUT", default_value = "5", value_name = "SECS")]
  pub telemetry_timeout_secs: u64,

  /// 上传大小上限（字节）
  #[arg(
    long,
    env = "QINGJIE_MAX_UPLOAD",
    default_value_t = DEFAULT_MAX_UPLOAD_BYTES,
    value_name = "BYTES"
  )]
  pub max_upload_bytes: usize,

  #[command(flatten)]
  pub model: ModelArgs,
}

impl ServerArgs {
  pub fn annotated_dir(&self) -> PathBuf {
    self.static_dir.join(ANNOTATED_DIR)
  }

  pub fn build_telemetry(&self) -> Result<Arc<dyn TelemetrySink>> {
    match &self.telemetry_url {
      Some(url) => {
        let sink = HttpTelemetry::new(
          url.clone(),
          Duration::from_secs(self.telemetry_timeout_secs),
        )
        .context("无法创建位置事件上报客户端")?;
        Ok(Arc::new(sink))
      }
      None => Ok(Arc::new(DisabledTelemetry)),
    }
  }
}
