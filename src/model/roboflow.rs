// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/model/roboflow.rs - Roboflow 托管推理客户端
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

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Model, PredictParams, ProviderError},
};

pub const DEFAULT_DETECT_ENDPOINT: &str = "https://detect.roboflow.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum RoboflowError {
  #[error("模型地址必须使用 {0} 方案")]
  SchemeMismatch(&'static str),
  #[error("模型地址缺少项目名: {0}")]
  MissingProject(String),
  #[error("模型地址缺少版本号: {0}")]
  MissingVersion(String),
  #[error("未配置 API Key")]
  MissingApiKey,
  #[error("推理地址无效: {0}")]
  InvalidEndpoint(#[from] url::ParseError),
  #[error("HTTP 客户端创建失败: {0}")]
  Client(#[from] reqwest::Error),
}

/// 由 `roboflow://<project>/<version>` 构造
#[derive(Debug, Clone)]
pub struct RoboflowBuilder {
  project: String,
  version: String,
  api_key: Option<String>,
  endpoint: String,
  client: Option<reqwest::Client>,
}

impl FromUrlWithScheme for RoboflowBuilder {
  const SCHEME: &'static str = "roboflow";
}

impl FromUrl for RoboflowBuilder {
  type Error = RoboflowError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RoboflowError::SchemeMismatch(Self::SCHEME));
    }

    let project = url
      .host_str()
      .filter(|host| !host.is_empty())
      .ok_or_else(|| RoboflowError::MissingProject(url.to_string()))?
      .to_string();
    let version = url
      .path()
      .trim_matches('/')
      .to_string();
    if version.is_empty() || version.contains('/') {
      return Err(RoboflowError::MissingVersion(url.to_string()));
    }

    Ok(RoboflowBuilder {
      project,
      version,
      api_key: None,
      endpoint: DEFAULT_DETECT_ENDPOINT.to_string(),
      client: None,
    })
  }
}

impl RoboflowBuilder {
  pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }

  pub fn client(mut self, client: reqwest::Client) -> Self {
    self.client = Some(client);
    self
  }

  pub fn build(self) -> Result<Roboflow, RoboflowError> {
    let api_key = self
      .api_key
      .filter(|key| !key.is_empty())
      .ok_or(RoboflowError::MissingApiKey)?;
    let infer_url = Url::parse(&format!(
      "{}/{}/{}",
      self.endpoint.trim_end_matches('/'),
      self.project,
      self.version
    ))?;
    let client = match self.client {
      Some(client) => client,
      None => reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?,
    };

    info!("检测模型: {}/{} @ {}", self.project, self.version, infer_url);
    Ok(Roboflow {
      client,
      infer_url,
      api_key,
    })
  }
}

/// Roboflow 托管目标检测模型
pub struct Roboflow {
  client: reqwest::Client,
  infer_url: Url,
  api_key: String,
}

impl Roboflow {
  pub fn infer_url(&self) -> &Url {
    &self.infer_url
  }
}

#[async_trait]
impl Model for Roboflow {
  async fn infer(
    &self,
    image: &Path,
    params: &PredictParams,
  ) -> Result<DetectResult, ProviderError> {
    let bytes = tokio::fs::read(image).await?;
    let body = general_purpose::STANDARD.encode(&bytes);
    debug!(
      "提交检测: {} ({} 字节, confidence={}, overlap={})",
      self.infer_url,
      bytes.len(),
      params.confidence,
      params.overlap
    );

    let query = [
      ("api_key", self.api_key.clone()),
      ("confidence", params.confidence.to_string()),
      ("overlap", params.overlap.to_string()),
      ("format", "json".to_string()),
    ];
    let response = self
      .client
      .post(self.infer_url.clone())
      .query(&query)
      .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
      .body(body)
      .send()
      .await
      .map_err(ProviderError::from_reqwest)?;

    let status = response.status();
    let text = response.text().await.map_err(ProviderError::from_reqwest)?;
    if !status.is_success() {
      return Err(ProviderError::Api {
        status: status.as_u16(),
        body: text,
      });
    }

    let result: DetectResult = serde_json::from_str(&text)?;
    debug!("检测返回 {} 个目标", result.len());
    Ok(result)
  }
}
