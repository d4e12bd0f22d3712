// 上传错误定义

use thiserror::Error;

/// 未选择文件时的提示文案
pub const NO_FILE_SELECTED_TEXT: &str = "Please select a file to upload!";

/// 文件超过上限时的提示文案
pub const FILE_TOO_LARGE_TEXT: &str = "Files greater than 50 mb are not allowed";

/// 进度通道出错时的提示文案
pub const PROGRESS_MONITOR_ERROR_TEXT: &str = "Error in progress monitoring!";

/// 进度通道传输层错误
///
/// 连接级别的失败，会终止整个订阅
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelTransportError {
    /// 建立连接失败
    #[error("连接进度通道失败: {0}")]
    Connect(String),

    /// 服务端返回非成功状态码
    #[error("进度通道返回异常状态码: {0}")]
    Status(u16),

    /// 读取事件流失败
    #[error("读取进度事件流失败: {0}")]
    Stream(String),

    /// 服务端关闭了事件流
    #[error("进度通道已被服务端关闭")]
    Closed,
}

/// 上传流程错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 未选择文件
    #[error("{}", NO_FILE_SELECTED_TEXT)]
    NoFileSelected,

    /// 文件过大（分类结果为 Rejected）
    #[error("{} (size={size_bytes})", FILE_TOO_LARGE_TEXT)]
    FileTooLarge { size_bytes: u64 },

    /// 单条进度消息解析失败（只丢弃该消息，通道保持打开）
    #[error("进度消息解析失败: {0}")]
    ChannelDecode(String),

    /// 进度通道传输失败
    #[error(transparent)]
    ChannelTransport(#[from] ChannelTransportError),

    /// 进度消息引用了计划之外的分片
    #[error("未知的分片编号: {0}")]
    UnknownPartNumber(u32),

    /// 外部传输失败
    #[error("上传失败: {0}")]
    Transfer(String),

    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// 是否为只影响单条消息、可在本地恢复的错误
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            UploadError::ChannelDecode(_) | UploadError::UnknownPartNumber(_)
        )
    }
}
