// 该文件是 Qingjie （清洁巡检） 项目的一部分。
// src/render.rs - 结果页面与 JSON 响应
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

use serde::Serialize;

use crate::{input::Coordinates, model::Prediction, task::Detection};

pub const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Waste Detection</title>
</head>
<body>
  <h1>Waste Detection</h1>
  <form action="/detect" method="post" enctype="multipart/form-data">
    <input type="file" name="file" accept="image/*">
    <button type="submit">Detect</button>
  </form>
  <h2>Report with location</h2>
  <form action="/detect_url" method="post" enctype="multipart/form-data">
    <input type="file" name="file" accept="image/*">
    <input type="text" name="latitude" placeholder="latitude">
    <input type="text" name="longitude" placeholder="longitude">
    <button type="submit">Report</button>
  </form>
</body>
</html>
"#;

/// `/detect_url` 成功响应
#[derive(Debug, Clone, Serialize)]
pub struct DetectUrlResponse {
  pub ifwaste: u8,
  pub data: Vec<Prediction>,
  pub image: String,
  pub latitude: f64,
  pub longitude: f64,
}

impl DetectUrlResponse {
  pub fn new(detection: Detection, coordinates: Coordinates) -> Self {
    Self {
      ifwaste: u8::from(detection.has_detections()),
      data: detection.result.predictions,
      image: detection.artifact,
      latitude: coordinates.latitude,
      longitude: coordinates.longitude,
    }
  }
}

pub fn result_page(detection: &Detection) -> String {
  let predictions = serde_json::to_string_pretty(&detection.result.predictions)
    .unwrap_or_else(|_| "[]".to_string());
  let rows: String = detection
    .result
    .predictions
    .iter()
    .map(|p| {
      format!(
        "    <tr><td>{}</td><td>{:.2}</td><td>{:.0}, {:.0}, {:.0}x{:.0}</td></tr>\n",
        escape_html(&p.class),
        p.confidence,
        p.x,
        p.y,
        p.width,
        p.height
      )
    })
    .collect();

  format!(
    r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Detection Result</title>
</head>
<body>
  <h1>Detection Result</h1>
  <img src="/getImage/{image}" alt="{path}">
  <p>{count} object(s) detected</p>
  <table>
    <tr><th>Class</th><th>Confidence</th><th>Box</th></tr>
{rows}  </table>
  <pre>{predictions}</pre>
  <a href="/">Back</a>
</body>
</html>
"#,
    image = escape_html(&detection.artifact),
    path = escape_html(&detection.relative_path()),
    count = detection.result.len(),
    rows = rows,
    predictions = escape_html(&predictions),
  )
}

pub fn error_page(message: &str) -> String {
  format!(
    r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Error</title>
</head>
<body>
  <h1>Error</h1>
  <p>{}</p>
  <a href="/">Back</a>
</body>
</html>
"#,
    escape_html(message)
  )
}

fn escape_html(raw: &str) -> String {
  let mut escaped = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c),
    }
  }
  escaped
}
