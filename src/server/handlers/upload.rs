// 上传 API 处理器

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use tracing::{info, warn};

use crate::server::error::{ApiError, ApiResponse, ApiResult};
use crate::server::state::AppState;
use crate::server::storage::{file_url, object_key};
use crate::uploader::chunk::plan;
use crate::uploader::error::{UploadError, NO_FILE_SELECTED_TEXT};
use crate::uploader::session::UploadCandidate;
use crate::uploader::strategy::{classify, Strategy};
use crate::uploader::transport::TransferReceipt;

/// 表单中的文件字段名
const FILE_FIELD: &str = "file";

/// 从表单中读取文件字段
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::BadRequest(NO_FILE_SELECTED_TEXT.to_string()))?;
        let data = field.bytes().await?;
        return Ok((file_name, data));
    }
    Err(ApiError::BadRequest(NO_FILE_SELECTED_TEXT.to_string()))
}

/// 上传文件
///
/// POST /upload （multipart 字段 `file`）
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<TransferReceipt>>> {
    let (file_name, data) = read_file_field(&mut multipart).await?;
    let size_bytes = data.len() as u64;
    let strategy = classify(size_bytes);
    info!(
        "API: 上传文件 file={}, size={} bytes, strategy={}",
        file_name, size_bytes, strategy
    );

    if !strategy.is_accepted() {
        warn!("文件过大，拒绝上传: file={}, size={}", file_name, size_bytes);
        return Err(ApiError::PayloadTooLarge(
            UploadError::FileTooLarge { size_bytes }.to_string(),
        ));
    }

    let key = object_key(&file_name)
        .ok_or_else(|| ApiError::BadRequest(format!("非法的文件名: {}", file_name)))?;

    // 进度按原始文件名推送，与订阅地址一致
    let publisher = state.hub.publisher(&file_name);
    let slot_id = publisher.slot_id();
    let result = match strategy {
        Strategy::Chunked => {
            let parts = plan(&UploadCandidate::new(file_name.clone(), size_bytes), strategy);
            state
                .store
                .put_multipart(&key, data, parts, &publisher)
                .await
        }
        _ => state.store.put_single(&key, data, &publisher).await,
    };
    drop(publisher);
    state.hub.finish(&file_name, slot_id);

    let parts = result?;
    info!("上传完成: {} -> {}, parts={}", file_name, key, parts);

    Ok(Json(ApiResponse::success(TransferReceipt {
        file_url: file_url(&key),
        object_key: key,
        strategy,
        parts,
        size_bytes,
    })))
}
