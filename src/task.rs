// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/task.rs - 检测任务流程
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
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task;
use tracing::{error, info};

use crate::{
  artifact::{ANNOTATED_DIR, ArtifactError, ArtifactStore, TempArtifact},
  input::{UploadedImage, decode_image},
  model::{DetectResult, Model, PredictParams, ProviderError},
  naming::HashNamer,
  output::{Annotate, BoxAnnotator, LabelAnnotator},
};

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("No file part")]
  NoFile,
  #[error("No selected file")]
  EmptyFilename,
  #[error("Image could not be read: {0}")]
  UndecodableImage(#[source] image::ImageError),
  #[error("Detection failed: {0}")]
  Provider(#[from] ProviderError),
  #[error("Storage failure: {0}")]
  Storage(#[from] ArtifactError),
  #[error("后台任务异常终止: {0}")]
  Join(#[from] task::JoinError),
}

/// 一次成功检测的结果
#[derive(Debug, Clone)]
pub struct Detection {
  /// 标注图像文件名，`<hash>.jpg`
  pub artifact: String,
  pub result: DetectResult,
}

impl Detection {
  /// 相对静态目录的路径
  pub fn relative_path(&self) -> String {
    format!("{}/{}", ANNOTATED_DIR, self.artifact)
  }

  pub fn has_detections(&self) -> bool {
    !self.result.is_empty()
  }
}

/// 上传 → 解码 → 临时文件 → 推理 → 删除临时文件 → 标注 → 保存
pub struct DetectTask {
  model: Arc<dyn Model>,
  box_annotator: Arc<dyn Annotate>,
  label_annotator: Arc<dyn Annotate>,
  store: ArtifactStore,
  work_dir: PathBuf,
  namer: HashNamer,
  params: PredictParams,
  timeout: Duration,
}

pub struct DetectTaskBuilder {
  model: Arc<dyn Model>,
  store: ArtifactStore,
  box_annotator: Option<Arc<dyn Annotate>>,
  label_annotator: Option<Arc<dyn Annotate>>,
  work_dir: Option<PathBuf>,
  namer: HashNamer,
  timeout: Duration,
}

impl DetectTaskBuilder {
  pub fn box_annotator(mut self, annotator: Arc<dyn Annotate>) -> Self {
    self.box_annotator = Some(annotator);
    self
  }

  pub fn label_annotator(mut self, annotator: Arc<dyn Annotate>) -> Self {
    self.label_annotator = Some(annotator);
    self
  }

  /// 临时文件目录，默认为标注目录的上一级
  pub fn work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
    self.work_dir = Some(work_dir.into());
    self
  }

  pub fn namer(mut self, namer: HashNamer) -> Self {
    self.namer = namer;
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn build(self) -> Result<DetectTask, ArtifactError> {
    let work_dir = match self.work_dir {
      Some(dir) => dir,
      None => self
        .store
        .root()
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir),
    };
    std::fs::create_dir_all(&work_dir)?;

    Ok(DetectTask {
      model: self.model,
      box_annotator: self
        .box_annotator
        .unwrap_or_else(|| Arc::new(BoxAnnotator::default())),
      label_annotator: self
        .label_annotator
        .unwrap_or_else(|| Arc::new(LabelAnnotator::new(None))),
      store: self.store,
      work_dir,
      namer: self.namer,
      params: PredictParams::default(),
      timeout: self.timeout,
    })
  }
}

impl DetectTask {
  pub fn builder(model: Arc<dyn Model>, store: ArtifactStore) -> DetectTaskBuilder {
    DetectTaskBuilder {
      model,
      store,
      box_annotator: None,
      label_annotator: None,
      work_dir: None,
      namer: HashNamer::default(),
      timeout: DEFAULT_PROVIDER_TIMEOUT,
    }
  }

  pub fn store(&self) -> &ArtifactStore {
    &self.store
  }

  pub fn params(&self) -> PredictParams {
    self.params
  }

  pub async fn run(&self, upload: Option<UploadedImage>) -> Result<Detection, DetectError> {
    let upload = upload.ok_or(DetectError::NoFile)?;
    if upload.filename.is_empty() {
      return Err(DetectError::EmptyFilename);
    }

    info!("开始检测: {} ({} 字节)", upload.filename, upload.bytes.len());
    let now = Instant::now();
    let hash = self.namer.name(&upload.filename, &upload.bytes);

    let (image, temp) = {
      let work_dir = self.work_dir.clone();
      let hash = hash.clone();
      task::spawn_blocking(move || -> Result<_, DetectError> {
        let image = decode_image(&upload.bytes).map_err(DetectError::UndecodableImage)?;
        let temp = TempArtifact::create(&work_dir, &hash, &image)?;
        Ok((image, temp))
      })
      .await??
    };

    let inference = self.model.infer(temp.path(), &self.params);
    let predicted = match tokio::time::timeout(self.timeout, inference).await {
      Ok(predicted) => predicted,
      Err(_) => Err(ProviderError::Timeout),
    };
    let elapsed = now.elapsed();

    // 推理结束后立即删除临时文件，无论成功与否
    if let Err(e) = temp.release() {
      error!("临时文件删除失败: {}", e);
      if predicted.is_ok() {
        return Err(e.into());
      }
    }

    let result = predicted.inspect_err(|e| error!("检测服务调用失败: {}", e))?;
    info!("推理完成，检测到 {} 个目标，耗时: {:.2?}", result.len(), elapsed);

    let artifact = ArtifactStore::output_name(&hash);
    let result = {
      let store = self.store.clone();
      let box_annotator = self.box_annotator.clone();
      let label_annotator = self.label_annotator.clone();
      let artifact = artifact.clone();
      task::spawn_blocking(move || -> Result<DetectResult, DetectError> {
        let labels = result.labels();
        let mut scene = image;
        box_annotator.annotate(&mut scene, &result.predictions, &labels);
        label_annotator.annotate(&mut scene, &result.predictions, &labels);
        store
          .persist_image(&artifact, &scene)
          .inspect_err(|e| error!("标注图像保存失败: {}", e))?;
        Ok(result)
      })
      .await??
    };
    info!("渲染完成，总耗时: {:.2?}", now.elapsed());

    Ok(Detection { artifact, result })
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;
  use image::RgbImage;

  use super::*;
  use crate::{artifact::TEMP_PREFIX, model::Prediction, naming::content_digest};

  #[derive(Default)]
  struct StubModel {
    calls: AtomicUsize,
    seen: Mutex<Vec<(PathBuf, bool)>>,
    fail: bool,
    delay: Option<Duration>,
    predictions: Vec<Prediction>,
  }

  #[async_trait]
  impl Model for StubModel {
    async fn infer(
      &self,
      image: &Path,
      params: &PredictParams,
    ) -> Result<DetectResult, ProviderError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      assert_eq!(*params, PredictParams::default());
      self
        .seen
        .lock()
        .unwrap()
        .push((image.to_path_buf(), image.is_file()));
      if let Some(delay) = self.delay {
        tokio::time::sleep(delay).await;
      }
      if self.fail {
        return Err(ProviderError::Api {
          status: 500,
          body: "boom".into(),
        });
      }
      Ok(DetectResult::from_predictions(self.predictions.clone()))
    }
  }

  fn png_bytes() -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    RgbImage::from_pixel(64, 48, image::Rgb([20, 20, 20]))
      .write_to(&mut cursor, image::ImageFormat::Png)
      .unwrap();
    cursor.into_inner()
  }

  fn setup(model: Arc<StubModel>) -> (tempfile::TempDir, DetectTask) {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join(ANNOTATED_DIR)).unwrap();
    let task = DetectTask::builder(model, store)
      .timeout(Duration::from_millis(200))
      .build()
      .unwrap();
    (dir, task)
  }

  fn temp_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
      .unwrap()
      .filter_map(Result::ok)
      .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
      .count()
  }

  #[tokio::test]
  async fn success_persists_content_addressed_artifact() {
    let model = Arc::new(StubModel {
      predictions: vec![Prediction::new("poop", 0.7, (32.0, 24.0), (10.0, 10.0))],
      ..Default::default()
    });
    let (dir, task) = setup(model.clone());
    let bytes = png_bytes();

    let detection = task
      .run(Some(UploadedImage::new("dog1.png", bytes.clone())))
      .await
      .unwrap();

    assert_eq!(detection.artifact, format!("{}.jpg", content_digest(&bytes)));
    assert_eq!(detection.relative_path(), format!("annotated_images/{}", detection.artifact));
    assert!(detection.has_detections());
    assert!(task.store().root().join(&detection.artifact).is_file());

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1, "temp file must exist while the model reads it");
    assert!(!seen[0].0.exists());
    assert_eq!(temp_files(dir.path()), 0);
  }

  #[tokio::test]
  async fn provider_failure_still_removes_temp_file() {
    let model = Arc::new(StubModel {
      fail: true,
      ..Default::default()
    });
    let (dir, task) = setup(model.clone());

    let err = task
      .run(Some(UploadedImage::new("dog1.png", png_bytes())))
      .await
      .unwrap_err();
    assert!(matches!(err, DetectError::Provider(ProviderError::Api { .. })));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(temp_files(dir.path()), 0);
    assert_eq!(std::fs::read_dir(task.store().root()).unwrap().count(), 0);
  }

  #[tokio::test]
  async fn slow_provider_times_out() {
    let model = Arc::new(StubModel {
      delay: Some(Duration::from_secs(5)),
      ..Default::default()
    });
    let (dir, task) = setup(model);

    let err = task
      .run(Some(UploadedImage::new("dog1.png", png_bytes())))
      .await
      .unwrap_err();
    assert!(matches!(err, DetectError::Provider(ProviderError::Timeout)));
    assert_eq!(temp_files(dir.path()), 0);
  }

  #[tokio::test]
  async fn input_errors_never_reach_the_model() {
    let model = Arc::new(StubModel::default());
    let (_dir, task) = setup(model.clone());

    assert!(matches!(task.run(None).await, Err(DetectError::NoFile)));
    assert!(matches!(
      task.run(Some(UploadedImage::new("", png_bytes()))).await,
      Err(DetectError::EmptyFilename)
    ));
    assert!(matches!(
      task
        .run(Some(UploadedImage::new("x.jpg", b"not an image".to_vec())))
        .await,
      Err(DetectError::UndecodableImage(_))
    ));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn empty_result_still_produces_artifact() {
    let model = Arc::new(StubModel::default());
    let (_dir, task) = setup(model);

    let detection = task
      .run(Some(UploadedImage::new("clean.png", png_bytes())))
      .await
      .unwrap();
    assert!(!detection.has_detections());
    assert!(task.store().root().join(&detection.artifact).is_file());
  }
}
