//! 分片进度跟踪
//!
//! 统计一个分片已写入的字节数，只有百分比前进到一定步长时才产生进度消息，
//! 避免每次写入都推送。分片写完时总会产生一条 100%

use crate::progress::message::ProgressMessage;

/// 单个分片的进度跟踪器
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    part_number: u32,
    part_size: u64,
    written: u64,
    /// 推送步长（百分比）
    step: f64,
    /// 上次推送的百分比
    last_emitted: f64,
    /// 是否已推送 100%
    completed: bool,
}

impl ProgressTracker {
    pub fn new(part_number: u32, part_size: u64, step: f64) -> Self {
        Self {
            part_number,
            part_size,
            written: 0,
            step,
            last_emitted: 0.0,
            completed: false,
        }
    }

    pub fn part_number(&self) -> u32 {
        self.part_number
    }

    /// 当前百分比
    pub fn percentage(&self) -> f64 {
        if self.part_size == 0 {
            return 100.0;
        }
        (self.written as f64 * 100.0 / self.part_size as f64).min(100.0)
    }

    /// 记录新写入的字节数，需要推送时返回进度消息
    pub fn advance(&mut self, bytes: u64) -> Option<ProgressMessage> {
        if self.completed {
            return None;
        }
        self.written = self.written.saturating_add(bytes).min(self.part_size);

        let percentage = self.percentage();
        if percentage >= 100.0 {
            return self.finish();
        }
        if percentage - self.last_emitted >= self.step {
            self.last_emitted = percentage;
            return Some(ProgressMessage::new(self.part_number, percentage));
        }
        None
    }

    /// 分片写完，若尚未推送 100% 则返回最后一条消息
    pub fn finish(&mut self) -> Option<ProgressMessage> {
        if self.completed {
            return None;
        }
        self.completed = true;
        self.written = self.part_size;
        self.last_emitted = 100.0;
        Some(ProgressMessage::new(self.part_number, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_on_step() {
        let mut tracker = ProgressTracker::new(1, 1000, 10.0);
        assert!(tracker.advance(50).is_none()); // 5%
        let msg = tracker.advance(50).unwrap(); // 10%
        assert_eq!(msg.part_number, 1);
        assert_eq!(msg.percentage, 10.0);
        assert!(tracker.advance(99).is_none()); // 19.9%
        assert_eq!(tracker.advance(1).unwrap().percentage, 20.0);
    }

    #[test]
    fn test_final_hundred_once() {
        let mut tracker = ProgressTracker::new(2, 100, 50.0);
        assert_eq!(tracker.advance(100).unwrap().percentage, 100.0);
        assert!(tracker.advance(10).is_none());
        assert!(tracker.finish().is_none());
    }

    #[test]
    fn test_finish_without_full_write() {
        let mut tracker = ProgressTracker::new(3, 100, 50.0);
        tracker.advance(10);
        assert_eq!(tracker.finish().unwrap().percentage, 100.0);
    }

    #[test]
    fn test_empty_part() {
        let mut tracker = ProgressTracker::new(1, 0, 5.0);
        assert_eq!(tracker.percentage(), 100.0);
        assert_eq!(tracker.finish().unwrap().percentage, 100.0);
    }

    #[test]
    fn test_monotonic_messages() {
        let mut tracker = ProgressTracker::new(1, 5 * 1024 * 1024, 5.0);
        let mut last = 0.0;
        let mut count = 0;
        for _ in 0..80 {
            if let Some(msg) = tracker.advance(64 * 1024) {
                assert!(msg.percentage > last);
                last = msg.percentage;
                count += 1;
            }
        }
        assert_eq!(last, 100.0);
        assert_eq!(count, 20);
    }
}
