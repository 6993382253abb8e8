// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/server/handlers.rs - 路由处理函数
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

use std::collections::HashMap;

use axum::{
  Json,
  extract::{Multipart, Path, State, rejection::JsonRejection},
  http::{StatusCode, header},
  response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{ApiError, AppState, PageError};
use crate::{
  artifact::{ANNOTATED_DIR, ArtifactError},
  input::{Coordinates, InputError, UploadedImage},
  render::{self, DetectUrlResponse},
  telemetry::{self, TelemetryEvent},
};

/// 解析后的上传表单
#[derive(Debug, Default)]
struct DetectForm {
  file: Option<UploadedImage>,
  fields: HashMap<String, String>,
}

impl DetectForm {
  fn field(&self, name: &str) -> Option<&str> {
    self.fields.get(name).map(String::as_str)
  }
}

async fn read_form(mut multipart: Multipart) -> Result<DetectForm, InputError> {
  let mut form = DetectForm::default();
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| InputError::Multipart(e.to_string()))?
  {
    let name = field.name().unwrap_or_default().to_string();
    if name == "file" {
      // 没有 filename 的同名文本字段不算上传文件
      let Some(filename) = field.file_name().map(str::to_string) else {
        debug!("忽略非文件的 file 字段");
        continue;
      };
      let bytes = field
        .bytes()
        .await
        .map_err(|e| InputError::Multipart(e.to_string()))?;
      form.file = Some(UploadedImage::new(filename, bytes));
    } else {
      let value = field
        .text()
        .await
        .map_err(|e| InputError::Multipart(e.to_string()))?;
      form.fields.insert(name, value);
    }
  }
  debug!(
    "表单字段: file={}, 其他={:?}",
    form.file.is_some(),
    form.fields.keys().collect::<Vec<_>>()
  );
  Ok(form)
}

pub async fn index() -> Html<&'static str> {
  Html(render::INDEX_PAGE)
}

pub async fn health() -> Json<Value> {
  Json(json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
  }))
}

/// POST /detect，返回结果页面
pub async fn detect(
  State(state): State<AppState>,
  multipart: Multipart,
) -> Result<Html<String>, PageError> {
  let form = read_form(multipart).await?;
  let detection = state.task.run(form.file).await?;
  Ok(Html(render::result_page(&detection)))
}

/// POST /detect_url，带坐标的 JSON 接口
pub async fn detect_url(
  State(state): State<AppState>,
  multipart: Multipart,
) -> Result<Json<DetectUrlResponse>, ApiError> {
  let form = read_form(multipart).await?;
  // 坐标必须在调用检测服务之前校验
  let coordinates = Coordinates::parse(form.field("latitude"), form.field("longitude"))?;

  let detection = state.task.run(form.file).await?;
  if detection.has_detections() {
    info!(
      "检测到 {} 个目标，上报位置 ({}, {})",
      detection.result.len(),
      coordinates.latitude,
      coordinates.longitude
    );
    telemetry::spawn_report(state.telemetry.clone(), TelemetryEvent::now(coordinates));
  }

  Ok(Json(DetectUrlResponse::new(detection, coordinates)))
}

/// GET /getImage/{name}
pub async fn get_image(
  State(state): State<AppState>,
  Path(name): Path<String>,
) -> Result<Response, ApiError> {
  let (bytes, mime) = state.store.fetch(&name).await?;
  Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
  filename: Option<String>,
}

/// POST /delete-annotated-image
///
/// 接受 `<name>.jpg` 或结果页给出的 `annotated_images/<name>.jpg`。
/// 请求体无法解析或缺少 `filename` 时同样返回 404。
pub async fn delete_annotated_image(
  State(state): State<AppState>,
  request: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  let not_found = (
    StatusCode::NOT_FOUND,
    Json(json!({ "message": "File not found" })),
  );

  let request = match request {
    Ok(Json(request)) => request,
    Err(rejection) => {
      warn!("删除请求无效: {}", rejection.body_text());
      return Ok(not_found);
    }
  };
  let Some(filename) = request.filename.filter(|f| !f.is_empty()) else {
    return Ok(not_found);
  };
  let prefix = format!("{}/", ANNOTATED_DIR);
  let name = filename.strip_prefix(&prefix).unwrap_or(&filename);

  match state.store.delete(name).await {
    Ok(()) => Ok((
      StatusCode::OK,
      Json(json!({ "message": "File deleted successfully" })),
    )),
    Err(ArtifactError::NotFound(_)) => Ok(not_found),
    Err(e) => Err(e.into()),
  }
}
