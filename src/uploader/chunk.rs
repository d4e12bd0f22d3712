// 上传分片规划
//
// 分片规则：
// - Small：整个文件作为 1 个分片
// - Chunked：固定 5MB 分片，最后一个分片可以更小，共 ceil(size / 5MB) 个
// - Rejected：不产生分片，调用方不得发起传输
//
// 分片编号从 1 开始，连续无空洞，创建后不再重排

use crate::uploader::session::UploadCandidate;
use crate::uploader::strategy::{Strategy, SMALL_MAX};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

/// 分片大小: 5MB（与单次上传阈值相同，即分片粒度）
pub const PART_SIZE: u64 = SMALL_MAX;

/// 上传分片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// 分片编号（从 1 开始）
    pub part_number: u32,
    /// 字节范围
    pub range: Range<u64>,
    /// 是否为最后一个分片
    pub expected_end: bool,
}

impl Part {
    /// 分片大小
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }

    /// 从完整文件内容中截取分片数据
    ///
    /// 数据长度不足时返回 None
    pub fn slice<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.range.start).ok()?;
        let end = usize::try_from(self.range.end).ok()?;
        data.get(start..end)
    }
}

/// 计算分片数量
pub fn part_count(size_bytes: u64, part_size: u64) -> u64 {
    if part_size == 0 {
        return 0;
    }
    size_bytes.div_ceil(part_size)
}

/// 按固定大小切分
///
/// 空文件也会得到 1 个空分片，保证每次上传至少有一条进度记录
pub fn split_parts(size_bytes: u64, part_size: u64) -> Vec<Part> {
    if size_bytes == 0 || part_size == 0 {
        return vec![Part {
            part_number: 1,
            range: 0..size_bytes,
            expected_end: true,
        }];
    }

    let mut parts = Vec::with_capacity(part_count(size_bytes, part_size) as usize);
    let mut offset = 0u64;
    let mut part_number = 1u32;

    while offset < size_bytes {
        let end = std::cmp::min(offset + part_size, size_bytes);
        parts.push(Part {
            part_number,
            range: offset..end,
            expected_end: end == size_bytes,
        });
        offset = end;
        part_number += 1;
    }

    parts
}

/// 为候选文件规划分片
pub fn plan(candidate: &UploadCandidate, strategy: Strategy) -> Vec<Part> {
    let parts = match strategy {
        Strategy::Small => split_parts(candidate.size_bytes, 0),
        Strategy::Chunked => split_parts(candidate.size_bytes, PART_SIZE),
        Strategy::Rejected => {
            warn!("被拒绝的文件不应规划分片: {}", candidate.name);
            Vec::new()
        }
    };

    debug!(
        "规划分片: file={}, size={} bytes, strategy={}, parts={}",
        candidate.name,
        candidate.size_bytes,
        strategy,
        parts.len()
    );

    parts
}
