//! 进度渲染状态
//!
//! 每个分片对应一条进度记录，按分片编号索引：
//! - 初始化时全部为 0
//! - 收到消息时直接覆盖（后写覆盖先写，不强制单调）
//! - 未知分片编号的消息被忽略
//! - 出错是单向的终态，只追加错误提示，不修改已有进度

use crate::uploader::chunk::Part;
use crate::uploader::error::UploadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单个分片的进度记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub part_number: u32,
    /// 百分比，范围 [0, 100]
    pub percentage: f64,
}

impl ProgressRecord {
    /// 进度条文字，保留一位小数
    pub fn label(&self) -> String {
        format!("{:.1}%", self.percentage)
    }
}

/// 提示类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// 进度区域中显示的一行提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// 渲染状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    records: BTreeMap<u32, ProgressRecord>,
    notices: Vec<Notice>,
    errored: bool,
}

impl RenderState {
    /// 为每个分片创建一条 0% 的记录
    pub fn init(parts: &[Part]) -> Self {
        let records = parts
            .iter()
            .map(|part| {
                (
                    part.part_number,
                    ProgressRecord {
                        part_number: part.part_number,
                        percentage: 0.0,
                    },
                )
            })
            .collect();

        Self {
            records,
            notices: Vec::new(),
            errored: false,
        }
    }

    /// 应用一条进度消息
    ///
    /// 百分比会被限制在 [0, 100]；分片编号不在计划内时返回 `UnknownPartNumber`，状态不变
    pub fn apply(&mut self, part_number: u32, percentage: f64) -> Result<(), UploadError> {
        let record = self
            .records
            .get_mut(&part_number)
            .ok_or(UploadError::UnknownPartNumber(part_number))?;
        record.percentage = percentage.clamp(0.0, 100.0);
        Ok(())
    }

    /// 标记出错并追加一条错误提示
    ///
    /// 只有第一次调用生效
    pub fn mark_error(&mut self, text: impl Into<String>) {
        if self.errored {
            return;
        }
        self.errored = true;
        self.notices.push(Notice::error(text));
    }

    /// 追加一条提示
    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// 按分片编号顺序返回所有记录
    pub fn records(&self) -> impl Iterator<Item = &ProgressRecord> {
        self.records.values()
    }

    pub fn record(&self, part_number: u32) -> Option<&ProgressRecord> {
        self.records.get(&part_number)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn is_errored(&self) -> bool {
        self.errored
    }

    /// 所有分片是否都达到 100%
    ///
    /// 只用于展示，不代表上传已完成
    pub fn all_full(&self) -> bool {
        !self.records.is_empty() && self.records.values().all(|r| r.percentage >= 100.0)
    }
}
