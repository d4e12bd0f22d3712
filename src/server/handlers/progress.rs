// 进度推送 API 处理器

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::progress::message::ProgressMessage;
use crate::server::error::{ApiError, ApiResult};
use crate::server::hub::ProgressHub;
use crate::server::state::AppState;
use crate::uploader::strategy::Strategy;

/// 订阅方断开时释放推送通道
struct SubscriptionGuard {
    hub: Arc<ProgressHub>,
    file_name: String,
    id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        debug!("进度流结束: file={}, id={}", self.file_name, self.id);
        self.hub.release(&self.file_name, self.id);
    }
}

fn message_stream(
    rx: mpsc::Receiver<ProgressMessage>,
    guard: SubscriptionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let message = rx.recv().await?;
        Some((Ok(Event::default().data(message.encode())), (rx, guard)))
    })
}

/// 进度消息流，上传结束（所有发布端释放）后再保持 `linger` 时长才结束
///
/// 计时从上传结束开始，请求体传输再慢也不会中途断流
fn progress_events(
    rx: mpsc::Receiver<ProgressMessage>,
    guard: SubscriptionGuard,
    linger: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let tail = stream::once(tokio::time::sleep(linger))
        .filter_map(|()| future::ready(None::<Result<Event, Infallible>>));
    message_stream(rx, guard).chain(tail)
}

/// 订阅文件上传进度
///
/// GET /progress/:strategy/:file_name
///
/// 上传结束后流保持打开，直到客户端断开或超过 `emitter_timeout_secs`
pub async fn progress_stream(
    State(state): State<AppState>,
    Path((segment, file_name)): Path<(String, String)>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let strategy = Strategy::from_path_segment(&segment)
        .ok_or_else(|| ApiError::NotFound(format!("未知的上传方式: {}", segment)))?;

    let (id, rx) = state.hub.subscribe(&file_name);
    info!(
        "API: 订阅上传进度 file={}, strategy={}, id={}",
        file_name, strategy, id
    );

    let guard = SubscriptionGuard {
        hub: Arc::clone(&state.hub),
        file_name,
        id,
    };
    let events = progress_events(rx, guard, state.config.upload.emitter_timeout());

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
