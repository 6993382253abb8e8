// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/bin/server.rs - 检测服务主程序
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use qingjie::{
  args::ServerArgs,
  artifact::ArtifactStore,
  server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("qingjie=info,tower_http=info")),
    )
    .init();

  let args = ServerArgs::parse();

  info!("监听地址: {}", args.bind);
  info!("静态目录: {}", args.static_dir.display());
  info!("检测模型: {}", args.model.model);
  match &args.telemetry_url {
    Some(url) => info!("位置上报: {}", url),
    None => warn!("未配置位置上报地址，位置事件将被丢弃"),
  }

  let store = ArtifactStore::open(args.annotated_dir())
    .with_context(|| format!("无法创建标注目录: {}", args.annotated_dir().display()))?;
  let task = args.model.build_task(store, args.static_dir.clone())?;
  let telemetry = args.build_telemetry()?;

  let app = server::router(AppState::new(task, telemetry), args.max_upload_bytes);

  let listener = tokio::net::TcpListener::bind(args.bind)
    .await
    .with_context(|| format!("无法监听: {}", args.bind))?;
  info!("服务已启动: http://{}", args.bind);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("服务异常退出")?;

  info!("服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      warn!("无法监听 Ctrl-C: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        warn!("无法监听 SIGTERM: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!("收到中断信号，准备退出...");
}
