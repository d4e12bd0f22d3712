// 上传会话定义

use crate::progress::render::{Notice, RenderState};
use crate::uploader::chunk::Part;
use crate::uploader::strategy::{classify, Strategy};
use crate::uploader::transport::TransferReceipt;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 小文件上传时的提示
pub const SMALL_UPLOAD_TEXT: &str = "Uploading...";

/// 分片上传时的提示
pub const CHUNKED_UPLOAD_TEXT: &str = "Chosen file is pretty large, uploading in chunks...";

/// 待上传文件
///
/// 选中后不可变，是分类的唯一依据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCandidate {
    /// 文件名（同时用作进度订阅标识）
    pub name: String,
    /// 文件大小
    pub size_bytes: u64,
    /// 本地文件路径（交给外部传输读取）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl UploadCandidate {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            source: None,
        }
    }

    /// 从本地文件创建
    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("读取文件信息失败: {:?}", path))?;
        if !metadata.is_file() {
            anyhow::bail!("不是普通文件: {:?}", path);
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("无法获取文件名: {:?}", path))?;

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            source: Some(path.to_path_buf()),
        })
    }

    /// 上传策略（每次由文件大小推导，不单独保存）
    pub fn strategy(&self) -> Strategy {
        classify(self.size_bytes)
    }
}

/// 会话状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// 空闲
    Idle,
    /// 分类中
    Classifying,
    /// 传输中，正在接收进度
    Streaming,
    /// 已完成
    Completed,
    /// 出错
    Errored,
    /// 文件过大被拒绝
    Rejected,
}

impl SessionState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Rejected
        )
    }
}

/// 上传会话
///
/// 由编排器独占，从选中文件开始，到订阅关闭（成功、出错或被新文件替换）为止
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// 会话ID
    pub id: String,
    pub candidate: UploadCandidate,
    /// 分片计划
    pub parts: Vec<Part>,
    /// 每个分片的进度
    pub progress: RenderState,
    pub state: SessionState,
    /// 外部传输的回执（完成后才有）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TransferReceipt>,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
}

impl UploadSession {
    /// 选中文件后创建会话，初始状态为分类中
    pub fn new(candidate: UploadCandidate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            candidate,
            parts: Vec::new(),
            progress: RenderState::default(),
            state: SessionState::Classifying,
            receipt: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.candidate.strategy()
    }

    /// 进入传输状态：保存分片计划并为每个分片创建进度记录
    pub fn begin_streaming(&mut self, parts: Vec<Part>) {
        let mut progress = RenderState::init(&parts);
        let text = match self.strategy() {
            Strategy::Chunked => CHUNKED_UPLOAD_TEXT,
            _ => SMALL_UPLOAD_TEXT,
        };
        progress.push_notice(Notice::info(text));

        self.parts = parts;
        self.progress = progress;
        self.state = SessionState::Streaming;
    }

    /// 拒绝上传
    pub fn reject(&mut self, text: &str) {
        self.parts.clear();
        self.progress = RenderState::default();
        self.progress.push_notice(Notice::error(text));
        self.state = SessionState::Rejected;
    }

    /// 外部传输成功
    pub fn complete(&mut self, receipt: TransferReceipt) {
        self.receipt = Some(receipt);
        self.state = SessionState::Completed;
    }

    /// 出错，保留已有进度
    pub fn fail(&mut self, text: impl Into<String>) {
        self.progress.mark_error(text);
        self.state = SessionState::Errored;
    }
}
