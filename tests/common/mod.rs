// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use qingjie::{
  artifact::{ANNOTATED_DIR, ArtifactStore, TEMP_PREFIX},
  model::{DetectResult, Model, PredictParams, Prediction, ProviderError},
  server::{self, AppState, DEFAULT_MAX_UPLOAD_BYTES},
  task::DetectTask,
  telemetry::{TelemetryError, TelemetryEvent, TelemetrySink},
};
use tower::ServiceExt;

pub const BOUNDARY: &str = "qingjie-test-boundary";

/// 可编排返回值的检测模型
#[derive(Default)]
pub struct MockModel {
  pub calls: AtomicUsize,
  pub predictions: Vec<Prediction>,
  pub fail: bool,
}

impl MockModel {
  pub fn returning(predictions: Vec<Prediction>) -> Self {
    Self {
      predictions,
      ..Default::default()
    }
  }

  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Default::default()
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Model for MockModel {
  async fn infer(
    &self,
    image: &Path,
    _params: &PredictParams,
  ) -> Result<DetectResult, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    assert!(image.is_file(), "temp artifact must exist during inference");
    if self.fail {
      return Err(ProviderError::Api {
        status: 503,
        body: "model unavailable".to_string(),
      });
    }
    Ok(DetectResult::from_predictions(self.predictions.clone()))
  }
}

/// 记录所有上报事件的上报端
#[derive(Default)]
pub struct RecordingTelemetry {
  pub events: Mutex<Vec<TelemetryEvent>>,
  pub fail: bool,
  pub delay: Option<Duration>,
}

impl RecordingTelemetry {
  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Default::default()
    }
  }

  /// 收到事件后挂起 `delay` 才返回
  pub fn slow(delay: Duration) -> Self {
    Self {
      delay: Some(delay),
      ..Default::default()
    }
  }

  pub fn events(&self) -> Vec<TelemetryEvent> {
    self.events.lock().unwrap().clone()
  }

  /// 上报在后台进行，等待至少 `count` 个事件到达
  pub async fn wait_for_events(&self, count: usize) -> Vec<TelemetryEvent> {
    for _ in 0..200 {
      let events = self.events();
      if events.len() >= count {
        return events;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    self.events()
  }
}

#[async_trait]
impl TelemetrySink for RecordingTelemetry {
  async fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
    self.events.lock().unwrap().push(*event);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.fail {
      return Err(TelemetryError::HttpStatus(500));
    }
    Ok(())
  }
}

pub struct TestApp {
  pub dir: tempfile::TempDir,
  pub router: Router,
  pub model: Arc<MockModel>,
  pub telemetry: Arc<RecordingTelemetry>,
}

impl TestApp {
  pub fn new(model: MockModel) -> Self {
    Self::with_telemetry(model, RecordingTelemetry::default())
  }

  pub fn with_telemetry(model: MockModel, telemetry: RecordingTelemetry) -> Self {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(model);
    let telemetry = Arc::new(telemetry);

    let store = ArtifactStore::open(dir.path().join(ANNOTATED_DIR)).unwrap();
    let task = DetectTask::builder(model.clone(), store)
      .work_dir(dir.path())
      .build()
      .unwrap();
    let state = AppState::new(task, telemetry.clone());
    let router = server::router(state, DEFAULT_MAX_UPLOAD_BYTES);

    Self {
      dir,
      router,
      model,
      telemetry,
    }
  }

  pub async fn send(&self, request: Request<Body>) -> Response<Body> {
    self.router.clone().oneshot(request).await.unwrap()
  }

  pub fn annotated_dir(&self) -> std::path::PathBuf {
    self.dir.path().join(ANNOTATED_DIR)
  }

  pub fn temp_files(&self) -> Vec<String> {
    std::fs::read_dir(self.dir.path())
      .unwrap()
      .filter_map(Result::ok)
      .map(|e| e.file_name().to_string_lossy().to_string())
      .filter(|name| name.starts_with(TEMP_PREFIX))
      .collect()
  }
}

pub fn poop() -> Prediction {
  let mut prediction = Prediction::new("poop", 0.83, (32.0, 24.0), (16.0, 12.0));
  prediction.class_id = Some(0);
  prediction
}

pub fn jpeg_bytes() -> Vec<u8> {
  let mut cursor = std::io::Cursor::new(Vec::new());
  image::RgbImage::from_pixel(64, 48, image::Rgb([90, 120, 60]))
    .write_to(&mut cursor, image::ImageFormat::Jpeg)
    .unwrap();
  cursor.into_inner()
}

/// 构造 multipart 请求体
pub fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
  let mut body = Vec::new();
  for (name, value) in fields {
    body.extend_from_slice(
      format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
      )
      .as_bytes(),
    );
  }
  if let Some((filename, bytes)) = file {
    body.extend_from_slice(
      format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
      )
      .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
  }
  body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
  body
}

pub fn multipart_request(
  uri: &str,
  file: Option<(&str, &[u8])>,
  fields: &[(&str, &str)],
) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header(
      "content-type",
      format!("multipart/form-data; boundary={BOUNDARY}"),
    )
    .body(Body::from(multipart_body(file, fields)))
    .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header("content-type", "application/json")
    .body(Body::from(json.to_string()))
    .unwrap()
}

pub fn post_raw(uri: &str, content_type: &str, body: &'static str) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header("content-type", content_type)
    .body(Body::from(body))
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
  response
    .into_body()
    .collect()
    .await
    .unwrap()
    .to_bytes()
    .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
  serde_json::from_slice(&body_bytes(response).await).unwrap()
}
