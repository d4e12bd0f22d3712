// 上传流程模块
//
// - `strategy`: 按文件大小选择上传策略
// - `chunk`: 分片规划
// - `session`: 上传会话与状态
// - `transport`: 外部传输约定
// - `orchestrator`: 串联分类、订阅、传输和渲染的状态机

pub mod chunk;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod strategy;
pub mod transport;

pub use chunk::{part_count, plan, split_parts, Part, PART_SIZE};
pub use error::{
    ChannelTransportError, UploadError, FILE_TOO_LARGE_TEXT, NO_FILE_SELECTED_TEXT,
    PROGRESS_MONITOR_ERROR_TEXT,
};
pub use orchestrator::{UploadOrchestrator, DEFAULT_REJECTED_DISPLAY};
pub use session::{
    SessionState, UploadCandidate, UploadSession, CHUNKED_UPLOAD_TEXT, SMALL_UPLOAD_TEXT,
};
pub use strategy::{classify, Strategy, CHUNKED_MAX, SMALL_MAX};
pub use transport::{HttpUploadTransport, TransferReceipt, TransferRequest, UploadTransport};
