// 外部传输
//
// 真正的字节传输由外部协作方完成，这里只定义调用约定，
// 并提供一个向进度服务器 POST multipart 表单的 HTTP 实现

use crate::server::ApiResponse;
use crate::uploader::error::UploadError;
use crate::uploader::session::UploadCandidate;
use crate::uploader::strategy::Strategy;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// 传输请求
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub file_name: String,
    pub size_bytes: u64,
    pub strategy: Strategy,
    /// 本地文件路径
    pub source: Option<PathBuf>,
}

impl TransferRequest {
    pub fn from_candidate(candidate: &UploadCandidate) -> Self {
        Self {
            file_name: candidate.name.clone(),
            size_bytes: candidate.size_bytes,
            strategy: candidate.strategy(),
            source: candidate.source.clone(),
        }
    }
}

/// 传输回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    /// 存储对象的键（带分类前缀）
    pub object_key: String,
    pub strategy: Strategy,
    /// 实际写入的分片数
    pub parts: u32,
    pub size_bytes: u64,
    /// 服务端下载地址（相对路径）
    #[serde(default)]
    pub file_url: String,
}

/// 外部传输接口
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// 发送文件，成功时返回回执
    async fn send(&self, request: TransferRequest) -> Result<TransferReceipt, UploadError>;
}

/// 通过 HTTP multipart 表单上传到进度服务器
#[derive(Debug, Clone)]
pub struct HttpUploadTransport {
    client: Client,
    base_url: String,
}

impl HttpUploadTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn send(&self, request: TransferRequest) -> Result<TransferReceipt, UploadError> {
        let source = request.source.as_ref().ok_or_else(|| {
            UploadError::Transfer(format!("缺少本地文件路径: {}", request.file_name))
        })?;

        let data = tokio::fs::read(source).await?;
        info!(
            "开始上传: file={}, size={} bytes, strategy={}",
            request.file_name,
            data.len(),
            request.strategy
        );

        let part = multipart::Part::bytes(data)
            .file_name(request.file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| UploadError::Transfer(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transfer(format!("上传请求发送失败: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Transfer(format!("读取上传响应失败: {}", e)))?;
        debug!("上传响应: status={}, body={}", status, body);

        let envelope: ApiResponse<TransferReceipt> = serde_json::from_str(&body).map_err(|e| {
            UploadError::Transfer(format!("解析上传响应失败: status={}, error={}", status, e))
        })?;

        match envelope.data {
            Some(receipt) if status.is_success() && envelope.code == 0 => {
                info!("上传完成: {} -> {}", request.file_name, receipt.object_key);
                Ok(receipt)
            }
            _ => {
                error!(
                    "上传失败: file={}, status={}, code={}, message={}",
                    request.file_name, status, envelope.code, envelope.message
                );
                Err(UploadError::Transfer(envelope.message))
            }
        }
    }
}
