//! 进度消息与订阅地址
//!
//! 消息格式：`{"partNumber": <正整数>, "percentage": <0..100>}`，其余字段忽略

use crate::uploader::error::UploadError;
use crate::uploader::strategy::Strategy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单个分片的进度消息
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    /// 分片编号（从 1 开始）
    pub part_number: u32,
    /// 该分片的完成百分比
    pub percentage: f64,
}

impl ProgressMessage {
    pub fn new(part_number: u32, percentage: f64) -> Self {
        Self {
            part_number,
            percentage,
        }
    }

    /// 解析一条事件数据
    ///
    /// 非数字、缺字段、负数分片编号、非有限百分比都视为解析失败
    pub fn decode(data: &str) -> Result<Self, UploadError> {
        let message: ProgressMessage = serde_json::from_str(data.trim())
            .map_err(|e| UploadError::ChannelDecode(format!("{}: {}", e, data)))?;

        if !message.percentage.is_finite() {
            return Err(UploadError::ChannelDecode(format!(
                "百分比不是有限数值: {}",
                data
            )));
        }

        Ok(message)
    }

    /// 编码为事件数据
    pub fn encode(&self) -> String {
        // 两个字段都是基础类型，序列化不会失败
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 进度订阅地址
///
/// 形如 `/progress/{singlepart|multipart}/{URL 编码后的文件名}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEndpoint {
    pub strategy: Strategy,
    pub file_name: String,
}

impl ProgressEndpoint {
    /// 创建订阅地址，Rejected 策略没有订阅地址
    pub fn new(strategy: Strategy, file_name: impl Into<String>) -> Option<Self> {
        strategy.path_segment()?;
        Some(Self {
            strategy,
            file_name: file_name.into(),
        })
    }

    /// 相对路径
    pub fn path(&self) -> String {
        format!(
            "/progress/{}/{}",
            self.strategy.path_segment().unwrap_or("singlepart"),
            urlencoding::encode(&self.file_name)
        )
    }

    /// 拼接完整 URL
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for ProgressEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_extra_fields() {
        let msg =
            ProgressMessage::decode(r#"{"partNumber":2,"percentage":42.5,"bytes":1024}"#).unwrap();
        assert_eq!(msg, ProgressMessage::new(2, 42.5));
    }

    #[test]
    fn test_decode_integer_percentage() {
        let msg = ProgressMessage::decode(r#"{"partNumber":1,"percentage":100}"#).unwrap();
        assert_eq!(msg.percentage, 100.0);
    }

    #[test]
    fn test_decode_malformed() {
        for data in [
            "",
            "not json",
            r#"{"partNumber":1}"#,
            r#"{"percentage":5.0}"#,
            r#"{"partNumber":-1,"percentage":5.0}"#,
            r#"{"partNumber":"1","percentage":5.0}"#,
        ] {
            let err = ProgressMessage::decode(data).unwrap_err();
            assert!(matches!(err, UploadError::ChannelDecode(_)), "{}", data);
        }
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let json = ProgressMessage::new(3, 15.0).encode();
        assert!(json.contains("\"partNumber\":3"));
        assert!(json.contains("\"percentage\":15.0"));
    }

    #[test]
    fn test_endpoint_paths() {
        let small = ProgressEndpoint::new(Strategy::Small, "photo.png").unwrap();
        assert_eq!(small.path(), "/progress/singlepart/photo.png");

        let chunked = ProgressEndpoint::new(Strategy::Chunked, "my report #1.pdf").unwrap();
        assert_eq!(chunked.path(), "/progress/multipart/my%20report%20%231.pdf");
        assert_eq!(
            chunked.url("http://127.0.0.1:18888/"),
            "http://127.0.0.1:18888/progress/multipart/my%20report%20%231.pdf"
        );

        assert!(ProgressEndpoint::new(Strategy::Rejected, "big.iso").is_none());
    }
}
