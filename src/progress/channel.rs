//! 进度通道客户端
//!
//! 每次上传打开一个只读的服务端推送订阅：
//! - `ProgressSource::open` 不阻塞，后台任务负责连接和读取
//! - `ProgressSubscription::next` 按服务端发送顺序返回解码后的消息
//! - 传输层错误最多上报一次，之后句柄进入关闭状态
//! - `close()` 幂等，任何状态下都可以调用

use crate::progress::message::{ProgressEndpoint, ProgressMessage};
use crate::progress::sse::SseDecoder;
use crate::uploader::error::ChannelTransportError;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 订阅内部缓冲的事件数
const CHANNEL_BUFFER: usize = 64;

/// 通道事件
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// 一条解码成功的进度消息
    Progress(ProgressMessage),
    /// 传输层失败（终止事件）
    Failed(ChannelTransportError),
}

/// 进度订阅句柄
///
/// 同一时刻只属于一个上传会话，不可共享；出错后不能复用
#[derive(Debug)]
pub struct ProgressSubscription {
    receiver: mpsc::Receiver<ChannelEvent>,
    cancel: CancellationToken,
    closed: bool,
}

impl ProgressSubscription {
    /// 由事件接收端和取消令牌构造句柄
    ///
    /// 生产者在令牌被取消后应停止发送
    pub fn new(receiver: mpsc::Receiver<ChannelEvent>, cancel: CancellationToken) -> Self {
        Self {
            receiver,
            cancel,
            closed: false,
        }
    }

    /// 创建一对（发送端, 句柄），供自定义的进度来源使用
    pub fn channel() -> (mpsc::Sender<ChannelEvent>, CancellationToken, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let cancel = CancellationToken::new();
        (tx, cancel.clone(), Self::new(rx, cancel))
    }

    /// 等待下一个事件
    ///
    /// 收到 `Failed` 后句柄自动关闭，之后始终返回 None
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }

        match self.receiver.recv().await {
            Some(ChannelEvent::Failed(error)) => {
                self.close();
                Some(ChannelEvent::Failed(error))
            }
            Some(event) => Some(event),
            None => {
                self.close();
                None
            }
        }
    }

    /// 关闭订阅（幂等）
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel.cancel();
        self.receiver.close();
    }

    /// 是否仍然打开
    pub fn is_open(&self) -> bool {
        !self.closed
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 进度来源
pub trait ProgressSource: Send + Sync {
    /// 打开一个订阅，不等待连接建立
    fn open(&self, endpoint: &ProgressEndpoint) -> ProgressSubscription;
}

/// 基于 SSE 的进度来源
#[derive(Debug, Clone)]
pub struct SseProgressSource {
    client: Client,
    base_url: String,
}

impl SseProgressSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl ProgressSource for SseProgressSource {
    fn open(&self, endpoint: &ProgressEndpoint) -> ProgressSubscription {
        let (tx, cancel, subscription) = ProgressSubscription::channel();
        let url = endpoint.url(&self.base_url);
        let client = self.client.clone();

        info!("打开进度订阅: {}", url);
        tokio::spawn(pump(client, url, tx, cancel));

        subscription
    }
}

/// 后台读取任务：连接、解码、转发，最后上报一次终止事件
async fn pump(
    client: Client,
    url: String,
    tx: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("进度订阅已取消: {}", url);
            return;
        }
        result = read_stream(&client, &url, &tx) => result,
    };

    if cancel.is_cancelled() {
        return;
    }

    let error = match result {
        Ok(()) => ChannelTransportError::Closed,
        Err(e) => e,
    };
    warn!("进度订阅中断: {} - {}", url, error);

    // 接收端已关闭时发送失败，忽略即可
    let _ = tx.send(ChannelEvent::Failed(error)).await;
}

/// 读取事件流直到结束
///
/// 返回 Ok 表示服务端正常结束了流（或接收端已不再需要）
async fn read_stream(
    client: &Client,
    url: &str,
    tx: &mpsc::Sender<ChannelEvent>,
) -> Result<(), ChannelTransportError> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| ChannelTransportError::Connect(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ChannelTransportError::Status(status.as_u16()));
    }
    debug!("进度订阅已连接: {}", url);

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ChannelTransportError::Stream(e.to_string()))?;

        for data in decoder.feed(&chunk) {
            match ProgressMessage::decode(&data) {
                Ok(message) => {
                    if tx.send(ChannelEvent::Progress(message)).await.is_err() {
                        return Ok(());
                    }
                }
                // 单条消息损坏不影响通道
                Err(e) => warn!("丢弃无法解析的进度消息: {}", e),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::strategy::Strategy;

    #[tokio::test]
    async fn test_messages_delivered_in_order() {
        let (tx, _cancel, mut subscription) = ProgressSubscription::channel();
        for (part, pct) in [(2, 10.0), (1, 5.0), (3, 50.0)] {
            tx.send(ChannelEvent::Progress(ProgressMessage::new(part, pct)))
                .await
                .unwrap();
        }

        let mut parts = Vec::new();
        for _ in 0..3 {
            match subscription.next().await {
                Some(ChannelEvent::Progress(msg)) => parts.push(msg.part_number),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(parts, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_failure_closes_handle() {
        let (tx, cancel, mut subscription) = ProgressSubscription::channel();
        tx.send(ChannelEvent::Failed(ChannelTransportError::Closed))
            .await
            .unwrap();
        // 失败之后的消息不会再被投递
        let _ = tx
            .send(ChannelEvent::Progress(ProgressMessage::new(1, 5.0)))
            .await;

        assert_eq!(
            subscription.next().await,
            Some(ChannelEvent::Failed(ChannelTransportError::Closed))
        );
        assert!(!subscription.is_open());
        assert!(cancel.is_cancelled());
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (tx, cancel, mut subscription) = ProgressSubscription::channel();
        subscription.close();
        subscription.close();
        assert!(cancel.is_cancelled());
        assert!(tx.is_closed());
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_cancels_reader() {
        let (_tx, cancel, subscription) = ProgressSubscription::channel();
        drop(subscription);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_connect_failure_reported_once() {
        // 端口 9 (discard) 上通常没有 HTTP 服务
        let source = SseProgressSource::new("http://127.0.0.1:9");
        let endpoint = ProgressEndpoint::new(Strategy::Small, "a.txt").unwrap();
        let mut subscription = source.open(&endpoint);

        match subscription.next().await {
            Some(ChannelEvent::Failed(ChannelTransportError::Connect(_))) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(subscription.next().await, None);
    }
}
