// Upload Progress Library
// 文件上传与分片进度推送核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 进度通道模块
pub mod progress;

// Web服务器模块
pub mod server;

// 上传流程模块
pub mod uploader;

// 导出常用类型
pub use config::AppConfig;
pub use progress::{
    ChannelEvent, ConsoleRenderer, ProgressEndpoint, ProgressMessage, ProgressRenderer,
    ProgressSource, ProgressSubscription, RenderState, SseProgressSource,
};
pub use server::AppState;
pub use uploader::{
    classify, plan, HttpUploadTransport, Part, SessionState, Strategy, TransferReceipt,
    UploadCandidate, UploadError, UploadOrchestrator, UploadSession, UploadTransport,
};
