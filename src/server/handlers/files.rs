// 文件下载与删除 API 处理器

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::server::error::{ApiError, ApiResponse, ApiResult};
use crate::server::state::AppState;
use crate::server::storage::{object_key, parse_object_key};

/// 删除文件请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    pub file_name: String,
}

/// 删除结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResult {
    pub object_key: String,
    /// 文件原本不存在时为 false
    pub deleted: bool,
}

/// 删除已上传的文件
///
/// POST /delete （JSON `{"fileName": "..."}`）
pub async fn delete_file(
    State(state): State<AppState>,
    Json(req): Json<DeleteFileRequest>,
) -> ApiResult<Json<ApiResponse<DeleteFileResult>>> {
    info!("API: 删除文件 file={}", req.file_name);

    let key = object_key(&req.file_name)
        .ok_or_else(|| ApiError::BadRequest(format!("非法的文件名: {}", req.file_name)))?;
    let deleted = state.store.delete(&key).await?;

    Ok(Json(ApiResponse::success(DeleteFileResult {
        object_key: key,
        deleted,
    })))
}

/// 下载已上传的文件
///
/// GET /files/*key
pub async fn download_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let key = parse_object_key(&key)
        .ok_or_else(|| ApiError::NotFound(format!("文件不存在: {}", key)))?;

    let data = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("文件不存在: {}", key)))?;

    info!("API: 下载文件 key={}, size={}", key, data.len());
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}
