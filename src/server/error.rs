// API 响应与错误

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 统一 API 响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}

/// API 错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 请求缺少字段或格式不对
    #[error("{0}")]
    BadRequest(String),

    /// 资源不存在
    #[error("{0}")]
    NotFound(String),

    /// 文件超过上限
    #[error("{0}")]
    PayloadTooLarge(String),

    /// 表单解析失败，沿用解析器给出的状态码
    #[error("{message}")]
    Multipart { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Multipart { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(format!("存储写入失败: {}", e))
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        ApiError::Multipart {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(ApiResponse::<()>::error(
            status.as_u16() as i32,
            self.to_string(),
        ));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::strategy::Strategy;
    use crate::uploader::transport::TransferReceipt;

    #[test]
    fn test_error_status() {
        assert_eq!(
            ApiError::PayloadTooLarge("x".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_body() {
        let body: ApiResponse<()> = ApiResponse::error(413, "too large".into());
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"code":413,"message":"too large"}"#);

        let parsed: ApiResponse<u32> = serde_json::from_str(&json).unwrap();
        assert!(parsed.data.is_none());
    }

    #[test]
    fn test_receipt_envelope_decodes() {
        // 回执类型没有 Default，缺少 data 时也要能解析
        let ok = r#"{"code":0,"message":"Success","data":{"objectKey":"misc/a.txt","strategy":"small","parts":1,"sizeBytes":3,"fileUrl":"/files/misc/a.txt"}}"#;
        let parsed: ApiResponse<TransferReceipt> = serde_json::from_str(ok).unwrap();
        let receipt = parsed.data.unwrap();
        assert_eq!(receipt.object_key, "misc/a.txt");
        assert_eq!(receipt.strategy, Strategy::Small);
        assert_eq!(receipt.file_url, "/files/misc/a.txt");

        let failed = r#"{"code":413,"message":"too large"}"#;
        let parsed: ApiResponse<TransferReceipt> = serde_json::from_str(failed).unwrap();
        assert_eq!(parsed.code, 413);
        assert!(parsed.data.is_none());
    }
}
