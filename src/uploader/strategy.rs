// 上传策略分类
//
// 规则（区间左闭右开）：
// - 文件 < 5MB：单次上传
// - 5MB <= 文件 < 50MB：分片上传
// - 文件 >= 50MB：拒绝

use serde::{Deserialize, Serialize};
use std::fmt;

/// 单次上传的文件大小上限（不含）: 5MB
pub const SMALL_MAX: u64 = 5 * 1024 * 1024;

/// 分片上传的文件大小上限（不含）: 50MB
pub const CHUNKED_MAX: u64 = 50 * 1024 * 1024;

/// 上传策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// 单次上传
    Small,
    /// 分片上传
    Chunked,
    /// 拒绝上传
    Rejected,
}

impl Strategy {
    /// 进度订阅地址中使用的路径段
    ///
    /// Rejected 不会打开订阅，因此没有路径段
    pub fn path_segment(&self) -> Option<&'static str> {
        match self {
            Strategy::Small => Some("singlepart"),
            Strategy::Chunked => Some("multipart"),
            Strategy::Rejected => None,
        }
    }

    /// 从路径段解析策略
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "singlepart" => Some(Strategy::Small),
            "multipart" => Some(Strategy::Chunked),
            _ => None,
        }
    }

    /// 是否允许上传
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Strategy::Rejected)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Small => "small",
            Strategy::Chunked => "chunked",
            Strategy::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// 根据文件大小选择上传策略
pub fn classify(size_bytes: u64) -> Strategy {
    match size_bytes {
        s if s < SMALL_MAX => Strategy::Small,
        s if s < CHUNKED_MAX => Strategy::Chunked,
        _ => Strategy::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Strategy;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(0), Strategy::Small);
        assert_eq!(classify(SMALL_MAX - 1), Strategy::Small);
        // 边界值归入较高一档
        assert_eq!(classify(SMALL_MAX), Strategy::Chunked);
        assert_eq!(classify(CHUNKED_MAX - 1), Strategy::Chunked);
        assert_eq!(classify(CHUNKED_MAX), Strategy::Rejected);
        assert_eq!(classify(u64::MAX), Strategy::Rejected);
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(Strategy::Small.path_segment(), Some("singlepart"));
        assert_eq!(Strategy::Chunked.path_segment(), Some("multipart"));
        assert_eq!(Strategy::Rejected.path_segment(), None);
        assert_eq!(Strategy::from_path_segment("multipart"), Some(Strategy::Chunked));
        assert_eq!(Strategy::from_path_segment("chunked"), None);
    }

    proptest! {
        #[test]
        fn prop_small_below_threshold(size in 0u64..SMALL_MAX) {
            prop_assert_eq!(classify(size), Strategy::Small);
        }

        #[test]
        fn prop_chunked_in_range(size in SMALL_MAX..CHUNKED_MAX) {
            prop_assert_eq!(classify(size), Strategy::Chunked);
        }

        #[test]
        fn prop_rejected_at_or_above_limit(size in CHUNKED_MAX..u64::MAX) {
            prop_assert_eq!(classify(size), Strategy::Rejected);
        }
    }
}
