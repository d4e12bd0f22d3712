// 进度通道模块
//
// - `message`: 进度消息格式与订阅地址
// - `sse`: SSE 增量解码
// - `channel`: 进度订阅客户端（可取消的消息序列）
// - `render`: 每个分片的进度渲染状态
// - `console`: 渲染回调与终端进度条

pub mod channel;
pub mod console;
pub mod message;
pub mod render;
pub mod sse;

pub use channel::{ChannelEvent, ProgressSource, ProgressSubscription, SseProgressSource};
pub use console::{ConsoleRenderer, ProgressRenderer};
pub use message::{ProgressEndpoint, ProgressMessage};
pub use render::{Notice, NoticeLevel, ProgressRecord, RenderState};
pub use sse::SseDecoder;
