// 上传编排器
//
// 状态机：
//   Idle --选择文件--> Classifying --Rejected--> Rejected --5秒后--> Idle
//                                  --Small/Chunked--> Streaming --传输成功--> Completed
//                                                              --通道出错/传输失败--> Errored
//   Completed / Errored / Rejected --选择新文件--> Classifying
//
// 进入 Streaming 的副作用顺序固定：规划分片 -> 初始化渲染状态 -> 打开订阅 -> 启动传输，
// 订阅必须在传输开始前打开，否则可能错过最早的进度消息。
//
// 所有事件（进度消息、通道错误、传输结果、拒绝提示到期）都在调用 `advance` 的
// 同一个逻辑线程上依次处理。

use crate::progress::channel::{ChannelEvent, ProgressSource, ProgressSubscription};
use crate::progress::console::ProgressRenderer;
use crate::progress::message::ProgressEndpoint;
use crate::uploader::chunk::plan;
use crate::uploader::error::{UploadError, FILE_TOO_LARGE_TEXT, PROGRESS_MONITOR_ERROR_TEXT};
use crate::uploader::session::{SessionState, UploadCandidate, UploadSession};
use crate::uploader::transport::{TransferReceipt, TransferRequest, UploadTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 拒绝提示的默认显示时长
pub const DEFAULT_REJECTED_DISPLAY: Duration = Duration::from_secs(5);

/// 一次唤醒的来源
enum Wakeup {
    Channel(Option<ChannelEvent>),
    Transfer(Result<Result<TransferReceipt, UploadError>, JoinError>),
}

/// 上传编排器
pub struct UploadOrchestrator<T, S, R>
where
    T: UploadTransport + 'static,
    S: ProgressSource,
    R: ProgressRenderer,
{
    transport: Arc<T>,
    source: S,
    renderer: R,
    /// 拒绝提示显示时长
    rejected_display: Duration,
    /// 当前会话
    session: Option<UploadSession>,
    /// 当前会话的进度订阅
    subscription: Option<ProgressSubscription>,
    /// 当前会话的传输任务
    transfer: Option<JoinHandle<Result<TransferReceipt, UploadError>>>,
    /// 拒绝提示的清除时间
    dismiss_at: Option<Instant>,
}

impl<T, S, R> UploadOrchestrator<T, S, R>
where
    T: UploadTransport + 'static,
    S: ProgressSource,
    R: ProgressRenderer,
{
    pub fn new(transport: T, source: S, renderer: R) -> Self {
        Self {
            transport: Arc::new(transport),
            source,
            renderer,
            rejected_display: DEFAULT_REJECTED_DISPLAY,
            session: None,
            subscription: None,
            transfer: None,
            dismiss_at: None,
        }
    }

    /// 设置拒绝提示显示时长
    pub fn with_rejected_display(mut self, duration: Duration) -> Self {
        self.rejected_display = duration;
        self
    }

    /// 当前状态
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    /// 当前会话
    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// 选择文件，开始一个新会话
    ///
    /// 未选择文件时返回 `NoFileSelected`，已有会话保持不变。
    /// 必须在 tokio 运行时中调用（会启动订阅和传输任务）
    pub fn select(&mut self, file: Option<UploadCandidate>) -> Result<SessionState, UploadError> {
        let candidate = file.ok_or(UploadError::NoFileSelected)?;

        // 替换旧会话前先关闭旧订阅，避免过期消息写入已丢弃的渲染状态
        self.teardown();

        let mut session = UploadSession::new(candidate);
        info!(
            "选择文件: session={}, file={}, size={} bytes",
            session.id, session.candidate.name, session.candidate.size_bytes
        );
        self.renderer.render(session.state, Some(&session));

        let strategy = session.strategy();
        match ProgressEndpoint::new(strategy, session.candidate.name.clone()) {
            None => {
                warn!(
                    "文件过大，拒绝上传: file={}, size={} bytes",
                    session.candidate.name, session.candidate.size_bytes
                );
                session.reject(FILE_TOO_LARGE_TEXT);
                self.dismiss_at = Some(Instant::now() + self.rejected_display);
            }
            Some(endpoint) => {
                // 1. 规划分片 2. 初始化渲染状态
                let parts = plan(&session.candidate, strategy);
                session.begin_streaming(parts);

                // 3. 打开订阅
                self.subscription = Some(self.source.open(&endpoint));
                self.renderer.render(session.state, Some(&session));

                // 4. 启动传输
                let request = TransferRequest::from_candidate(&session.candidate);
                let transport = Arc::clone(&self.transport);
                self.transfer = Some(tokio::spawn(async move { transport.send(request).await }));

                info!(
                    "开始上传: session={}, strategy={}, parts={}, progress={}",
                    session.id,
                    strategy,
                    session.parts.len(),
                    endpoint
                );
            }
        }

        let state = session.state;
        if state == SessionState::Rejected {
            self.renderer.render(state, Some(&session));
        }
        self.session = Some(session);
        Ok(state)
    }

    /// 处理下一个事件
    ///
    /// 返回处理后的状态；当前没有待处理的事件时返回 None
    /// （空闲、已完成、已出错）。该方法可以安全地在 `select!` 中被取消
    pub async fn advance(&mut self) -> Option<SessionState> {
        match self.state() {
            SessionState::Rejected => {
                let deadline = self.dismiss_at?;
                tokio::time::sleep_until(deadline).await;
                self.dismiss();
                Some(SessionState::Idle)
            }
            SessionState::Streaming => {
                let wakeup = {
                    let transfer = self.transfer.as_mut()?;
                    match self.subscription.as_mut().filter(|s| s.is_open()) {
                        Some(subscription) => tokio::select! {
                            // 先处理已到达的进度消息，再处理传输结果
                            biased;
                            event = subscription.next() => Wakeup::Channel(event),
                            joined = transfer => Wakeup::Transfer(joined),
                        },
                        None => Wakeup::Transfer(transfer.await),
                    }
                };
                Some(self.handle(wakeup))
            }
            _ => None,
        }
    }

    /// 持续处理事件直到会话结束
    ///
    /// 返回会话到达的终态；被拒绝的会话会等待提示清除后回到空闲，但仍返回 Rejected
    pub async fn settle(&mut self) -> SessionState {
        let mut last = self.state();
        while let Some(state) = self.advance().await {
            if state.is_terminal() {
                last = state;
            }
        }
        if last.is_terminal() {
            last
        } else {
            self.state()
        }
    }

    fn handle(&mut self, wakeup: Wakeup) -> SessionState {
        match wakeup {
            Wakeup::Channel(Some(ChannelEvent::Progress(message))) => {
                if let Some(session) = self.session.as_mut() {
                    match session
                        .progress
                        .apply(message.part_number, message.percentage)
                    {
                        Ok(()) => {
                            debug!(
                                "进度更新: part={}, percentage={:.1}",
                                message.part_number, message.percentage
                            );
                            self.renderer.render(session.state, Some(session));
                        }
                        Err(e) if e.is_recoverable() => debug!("忽略进度消息: {}", e),
                        Err(e) => warn!("应用进度消息失败: {}", e),
                    }
                }
            }
            Wakeup::Channel(Some(ChannelEvent::Failed(error))) => {
                warn!("进度监控出错: {}", error);
                // 传输继续在后台进行，只是不再跟踪结果
                self.transfer.take();
                self.finish(|session| session.fail(PROGRESS_MONITOR_ERROR_TEXT));
            }
            Wakeup::Channel(None) => {
                debug!("进度订阅已关闭，等待传输结果");
            }
            Wakeup::Transfer(Ok(Ok(receipt))) => {
                info!("上传完成: {}", receipt.object_key);
                if let Some(session) = self.session.as_ref() {
                    if !session.progress.all_full() {
                        debug!("传输已完成，部分分片进度尚未到达 100%");
                    }
                }
                self.transfer.take();
                self.finish(|session| session.complete(receipt));
            }
            Wakeup::Transfer(Ok(Err(error))) => {
                warn!("上传失败: {}", error);
                self.transfer.take();
                self.finish(|session| session.fail(error.to_string()));
            }
            Wakeup::Transfer(Err(join_error)) => {
                warn!("上传任务异常退出: {}", join_error);
                self.transfer.take();
                let text = UploadError::Transfer(join_error.to_string()).to_string();
                self.finish(|session| session.fail(text));
            }
        }
        self.state()
    }

    /// 进入终态：关闭订阅，更新会话并渲染
    fn finish(&mut self, update: impl FnOnce(&mut UploadSession)) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        if let Some(session) = self.session.as_mut() {
            update(session);
            self.renderer.render(session.state, Some(session));
        }
    }

    /// 拒绝提示到期，回到空闲
    fn dismiss(&mut self) {
        self.dismiss_at = None;
        if let Some(session) = self.session.take() {
            debug!("清除拒绝提示: session={}", session.id);
        }
        self.renderer.render(SessionState::Idle, None);
    }

    /// 结束当前会话持有的资源
    fn teardown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        if let Some(transfer) = self.transfer.take() {
            if self.state() == SessionState::Streaming {
                info!("新文件替换了进行中的上传，取消旧传输");
                transfer.abort();
            }
        }
        self.dismiss_at = None;
        self.session = None;
    }
}

impl<T, S, R> Drop for UploadOrchestrator<T, S, R>
where
    T: UploadTransport + 'static,
    S: ProgressSource,
    R: ProgressRenderer,
{
    fn drop(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}
