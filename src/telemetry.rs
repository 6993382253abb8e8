// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/telemetry.rs - 位置事件上报
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
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::input::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryEvent {
  /// Unix 毫秒时间戳
  pub timestamp: i64,
  pub latitude: f64,
  pub longitude: f64,
}

impl TelemetryEvent {
  pub fn now(coordinates: Coordinates) -> Self {
    Self {
      timestamp: chrono::Utc::now().timestamp_millis(),
      latitude: coordinates.latitude,
      longitude: coordinates.longitude,
    }
  }
}

#[derive(Error, Debug)]
pub enum TelemetryError {
  #[error("上报请求失败: {0}")]
  Request(#[from] reqwest::Error),
  #[error("上报服务返回 HTTP {0}")]
  HttpStatus(u16),
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
  async fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

/// 以 JSON POST 上报到外部地址，不重试
pub struct HttpTelemetry {
  client: reqwest::Client,
  url: Url,
}

impl HttpTelemetry {
  pub fn new(url: Url, timeout: Duration) -> Result<Self, TelemetryError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    info!("位置事件上报地址: {}", url);
    Ok(Self { client, url })
  }
}

#[async_trait]
impl TelemetrySink for HttpTelemetry {
  async fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
    let response = self
      .client
      .post(self.url.clone())
      .json(event)
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(TelemetryError::HttpStatus(response.status().as_u16()));
    }
    debug!("位置事件已上报: {:?}", event);
    Ok(())
  }
}

/// 未配置上报地址时使用
pub struct DisabledTelemetry;

#[async_trait]
impl TelemetrySink for DisabledTelemetry {
  async fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
    debug!("未配置上报地址，丢弃位置事件: {:?}", event);
    Ok(())
  }
}

/// 在后台上报，调用方无需等待上报完成
pub fn spawn_report(sink: Arc<dyn TelemetrySink>, event: TelemetryEvent) -> JoinHandle<()> {
  tokio::spawn(async move { report(sink.as_ref(), event).await })
}

/// 尽力上报，失败只记录日志
pub async fn report(sink: &dyn TelemetrySink, event: TelemetryEvent) {
  if let Err(e) = sink.send(&event).await {
    warn!(
      latitude = event.latitude,
      longitude = event.longitude,
      error = %e,
      "位置事件上报失败"
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::Matcher;

  fn event() -> TelemetryEvent {
    TelemetryEvent {
      timestamp: 1_700_000_000_123,
      latitude: 34.5678,
      longitude: -118.5678,
    }
  }

  #[test]
  fn event_serializes_flat() {
    assert_eq!(
      serde_json::to_value(event()).unwrap(),
      serde_json::json!({
        "timestamp": 1_700_000_000_123i64,
        "latitude": 34.5678,
        "longitude": -118.5678
      })
    );
  }

  #[tokio::test]
  async fn http_sink_posts_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/events")
      .match_body(Matcher::Json(serde_json::to_value(event()).unwrap()))
      .with_status(204)
      .expect(1)
      .create_async()
      .await;

    let url = Url::parse(&format!("{}/events", server.url())).unwrap();
    let sink = HttpTelemetry::new(url, Duration::from_secs(5)).unwrap();
    sink.send(&event()).await.unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn http_sink_reports_status_and_report_swallows_it() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("POST", "/events")
      .with_status(500)
      .create_async()
      .await;

    let url = Url::parse(&format!("{}/events", server.url())).unwrap();
    let sink = HttpTelemetry::new(url, Duration::from_secs(5)).unwrap();
    assert!(matches!(
      sink.send(&event()).await,
      Err(TelemetryError::HttpStatus(500))
    ));

    report(&sink, event()).await;
  }

  #[tokio::test]
  async fn spawned_report_delivers_in_background() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/events")
      .with_status(500)
      .expect(1)
      .create_async()
      .await;

    let url = Url::parse(&format!("{}/events", server.url())).unwrap();
    let sink: Arc<dyn TelemetrySink> =
      Arc::new(HttpTelemetry::new(url, Duration::from_secs(5)).unwrap());
    spawn_report(sink, event()).await.unwrap();
    mock.assert_async().await;
  }
}
