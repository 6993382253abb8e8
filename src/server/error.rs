// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/server/error.rs - HTTP 错误响应
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

use axum::{
  Json,
  http::StatusCode,
  response::{Html, IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{artifact::ArtifactError, input::InputError, render, task::DetectError};

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// JSON 接口的错误，响应体为 `{"error": "..."}`
#[derive(Error, Debug)]
pub enum ApiError {
  #[error(transparent)]
  Input(#[from] InputError),
  #[error(transparent)]
  Detect(#[from] DetectError),
  #[error(transparent)]
  Artifact(#[from] ArtifactError),
}

impl ApiError {
  /// 检测服务失败返回 402，与页面接口区分
  fn status_and_message(&self) -> (StatusCode, String) {
    match self {
      ApiError::Input(e) => (StatusCode::BAD_REQUEST, e.to_string()),
      ApiError::Detect(e) => classify_detect_error(e, StatusCode::PAYMENT_REQUIRED),
      ApiError::Artifact(ArtifactError::NotFound(_)) => {
        (StatusCode::NOT_FOUND, "Image not found".to_string())
      }
      ApiError::Artifact(e) => {
        error!(error = %e, "产物读写失败");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          INTERNAL_MESSAGE.to_string(),
        )
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = self.status_and_message();
    (status, Json(json!({ "error": message }))).into_response()
  }
}

/// 页面接口的错误，渲染为错误页
#[derive(Error, Debug)]
pub enum PageError {
  #[error(transparent)]
  Input(#[from] InputError),
  #[error(transparent)]
  Detect(#[from] DetectError),
}

impl IntoResponse for PageError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      PageError::Input(e) => (StatusCode::BAD_REQUEST, e.to_string()),
      PageError::Detect(e) => classify_detect_error(e, StatusCode::INTERNAL_SERVER_ERROR),
    };
    (status, Html(render::error_page(&message))).into_response()
  }
}

fn classify_detect_error(err: &DetectError, provider_status: StatusCode) -> (StatusCode, String) {
  match err {
    DetectError::NoFile | DetectError::EmptyFilename | DetectError::UndecodableImage(_) => {
      (StatusCode::BAD_REQUEST, err.to_string())
    }
    DetectError::Provider(_) => (provider_status, err.to_string()),
    DetectError::Storage(_) | DetectError::Join(_) => {
      error!(error = %err, "检测请求内部错误");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        INTERNAL_MESSAGE.to_string(),
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ProviderError;

  #[test]
  fn provider_failure_status_depends_on_route() {
    let api = ApiError::from(DetectError::Provider(ProviderError::Timeout));
    assert_eq!(api.into_response().status(), StatusCode::PAYMENT_REQUIRED);

    let page = PageError::from(DetectError::Provider(ProviderError::Timeout));
    assert_eq!(
      page.into_response().status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn input_errors_are_bad_requests() {
    for err in [DetectError::NoFile, DetectError::EmptyFilename] {
      assert_eq!(
        ApiError::from(err).into_response().status(),
        StatusCode::BAD_REQUEST
      );
    }
    let coords = ApiError::from(InputError::MissingCoordinate("latitude"));
    assert_eq!(coords.into_response().status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn storage_errors_hide_details() {
    let err = ApiError::from(DetectError::Storage(ArtifactError::IoError(
      std::io::Error::other("disk full"),
    )));
    let (status, message) = err.status_and_message();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, INTERNAL_MESSAGE);
  }

  #[test]
  fn missing_artifact_is_not_found() {
    let err = ApiError::from(ArtifactError::NotFound("x.jpg".into()));
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
  }
}
