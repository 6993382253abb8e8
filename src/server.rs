// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/server.rs - HTTP 服务
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

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
  artifact::{ANNOTATED_DIR, ArtifactStore},
  task::DetectTask,
  telemetry::TelemetrySink,
};

mod error;
mod handlers;

pub use self::error::{ApiError, PageError};

/// 默认上传大小上限
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// 所有处理函数共享的状态，克隆开销很小
#[derive(Clone)]
pub struct AppState {
  pub task: Arc<DetectTask>,
  pub store: ArtifactStore,
  pub telemetry: Arc<dyn TelemetrySink>,
}

impl AppState {
  pub fn new(task: DetectTask, telemetry: Arc<dyn TelemetrySink>) -> Self {
    let store = task.store().clone();
    Self {
      task: Arc::new(task),
      store,
      telemetry,
    }
  }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
  Router::new()
    .route("/", get(handlers::index))
    .route("/health", get(handlers::health))
    .route("/detect", post(handlers::detect))
    .route("/detect_url", post(handlers::detect_url))
    .route("/getImage/{name}", get(handlers::get_image))
    .route(
      "/delete-annotated-image",
      post(handlers::delete_annotated_image),
    )
    .route(
      &format!("/static/{}/{{name}}", ANNOTATED_DIR),
      get(handlers::get_image),
    )
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
