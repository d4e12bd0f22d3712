//! 进度推送中心
//!
//! 按文件名登记推送通道，上传处理器（发布方）和进度流（订阅方）可以任意顺序到达：
//! - 订阅方先到：创建通道并取走接收端，发布方之后拿到同一个发送端
//! - 发布方先到：消息先缓冲在通道里（有上限，溢出丢弃），订阅方到达后一并读取
//!
//! 上传结束时调用 `finish`；订阅方断开时由 `release` 清理

use crate::progress::message::ProgressMessage;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 每个文件缓冲的最大消息数
const SLOT_BUFFER: usize = 256;

/// 无人认领的通道保留时长
const UNCLAIMED_TTL: Duration = Duration::from_secs(60);

/// 一个文件的推送通道
#[derive(Debug)]
struct Slot {
    id: u64,
    /// 上传结束后为 None
    tx: Option<mpsc::Sender<ProgressMessage>>,
    /// 订阅方取走前为 Some
    rx: Option<mpsc::Receiver<ProgressMessage>>,
    created_at: Instant,
}

/// 发布端
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    file_name: String,
    /// 所属通道的ID，结束上传时用来核对
    slot_id: u64,
    tx: mpsc::Sender<ProgressMessage>,
}

impl ProgressPublisher {
    pub fn slot_id(&self) -> u64 {
        self.slot_id
    }

    /// 推送一条消息，不等待
    pub fn publish(&self, message: ProgressMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(
                    "进度缓冲已满，丢弃消息: file={}, part={}, percentage={:.1}",
                    self.file_name, msg.part_number, msg.percentage
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("进度订阅已断开: file={}", self.file_name);
            }
        }
    }
}

/// 进度推送中心
#[derive(Debug)]
pub struct ProgressHub {
    slots: DashMap<String, Slot>,
    next_id: AtomicU64,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHub {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 新建通道，返回（通道, 发送端, 接收端），通道本身不持有接收端
    fn open_slot(&self) -> (Slot, mpsc::Sender<ProgressMessage>, mpsc::Receiver<ProgressMessage>) {
        let (tx, rx) = mpsc::channel(SLOT_BUFFER);
        let slot = Slot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            tx: Some(tx.clone()),
            rx: None,
            created_at: Instant::now(),
        };
        (slot, tx, rx)
    }

    /// 新建等待订阅方认领的通道
    fn pending_slot(&self) -> Slot {
        let (mut slot, _, rx) = self.open_slot();
        slot.rx = Some(rx);
        slot
    }

    /// 订阅一个文件的进度，返回（订阅ID, 接收端）
    ///
    /// 同名文件已有订阅方时，新订阅方替换旧的
    pub fn subscribe(&self, file_name: &str) -> (u64, mpsc::Receiver<ProgressMessage>) {
        let mut slot = self
            .slots
            .entry(file_name.to_string())
            .or_insert_with(|| self.pending_slot());

        let rx = match slot.rx.take() {
            Some(rx) => rx,
            None => {
                debug!("替换已有的进度订阅: file={}", file_name);
                let (fresh, _, rx) = self.open_slot();
                *slot = fresh;
                rx
            }
        };

        debug!("进度订阅: file={}, id={}", file_name, slot.id);
        (slot.id, rx)
    }

    /// 获取一个文件的发布端
    pub fn publisher(&self, file_name: &str) -> ProgressPublisher {
        self.prune();

        let mut slot = self
            .slots
            .entry(file_name.to_string())
            .or_insert_with(|| self.pending_slot());

        let tx = match slot.tx.clone() {
            Some(tx) => tx,
            None => {
                // 同名文件的上一次上传已结束，重新开始
                let (mut fresh, tx, rx) = self.open_slot();
                fresh.rx = Some(rx);
                *slot = fresh;
                tx
            }
        };

        ProgressPublisher {
            file_name: file_name.to_string(),
            slot_id: slot.id,
            tx,
        }
    }

    /// 上传结束
    ///
    /// 已有订阅方时直接移除通道，订阅方读完剩余消息后结束；
    /// 还没有订阅方时保留缓冲的消息，等订阅方来取。
    /// 通道已被同名文件的新订阅替换时不做任何事
    pub fn finish(&self, file_name: &str, slot_id: u64) {
        let claimed = match self.slots.get_mut(file_name) {
            Some(mut slot) if slot.id == slot_id => {
                slot.tx = None;
                slot.rx.is_none()
            }
            Some(_) => {
                debug!("通道已被替换，忽略结束: file={}, id={}", file_name, slot_id);
                return;
            }
            None => return,
        };
        if claimed {
            self.slots
                .remove_if(file_name, |_, slot| slot.id == slot_id && slot.rx.is_none());
        }
    }

    /// 订阅方断开
    pub fn release(&self, file_name: &str, id: u64) {
        if self
            .slots
            .remove_if(file_name, |_, slot| slot.id == id)
            .is_some()
        {
            debug!("进度订阅已释放: file={}, id={}", file_name, id);
        }
    }

    /// 清理长时间无人认领的通道
    fn prune(&self) {
        self.slots
            .retain(|_, slot| slot.rx.is_none() || slot.created_at.elapsed() < UNCLAIMED_TTL);
    }

    /// 当前登记的通道数
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
