// API处理器模块

pub mod files;
pub mod progress;
pub mod upload;

use axum::Json;
use serde::Serialize;

pub use files::{delete_file, download_file};
pub use progress::progress_stream;
pub use upload::upload_file;

/// 健康检查响应结构
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// 健康检查
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
    })
}
