//! Server-Sent Events 增量解码器
//!
//! 只处理进度通道需要的子集：
//! - 行结束符支持 LF / CRLF / CR
//! - 同一事件的多行 `data:` 用换行拼接
//! - 以 `:` 开头的注释行（心跳）忽略
//! - 只派发默认的 `message` 事件，其余命名事件丢弃

use tracing::trace;

/// SSE 解码器
///
/// 网络数据块可能在任意位置断开，未完成的行保留在缓冲区中
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// 尚未遇到行结束符的字节
    buffer: Vec<u8>,
    /// 当前事件已累积的 data 行
    data_lines: Vec<String>,
    /// 当前事件的类型
    event_type: Option<String>,
    /// 上一个数据块是否以 CR 结尾（用于吞掉紧随的 LF）
    pending_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一块数据，返回本块中完成的所有事件的 data
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.finish_line(&mut events),
                b'\r' => {
                    self.pending_cr = true;
                    self.finish_line(&mut events);
                }
                _ => self.buffer.push(byte),
            }
        }

        events
    }

    /// 处理一整行
    fn finish_line(&mut self, events: &mut Vec<String>) {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();

        // 空行：派发事件
        if line.is_empty() {
            self.dispatch(events);
            return;
        }

        // 注释 / 心跳
        if line.starts_with(':') {
            trace!("收到 SSE 注释行");
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };

        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event_type = Some(value.to_string()),
            // id / retry 与进度无关
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        let event_type = self.event_type.take();
        if self.data_lines.is_empty() {
            return;
        }

        let data = self.data_lines.join("\n");
        self.data_lines.clear();

        match event_type.as_deref() {
            None | Some("") | Some("message") => events.push(data),
            Some(other) => trace!("忽略命名事件: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"partNumber\":1,\"percentage\":5.0}\n\n");
        assert_eq!(events, vec![r#"{"partNumber":1,"percentage":5.0}"#.to_string()]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: abc\r").is_empty());
        assert!(decoder.feed(b"\n").is_empty());
        assert_eq!(decoder.feed(b"\r\n"), vec!["abc".to_string()]);
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\n\ndata: a\ndata:b\n\ndata: c\n\n");
        assert_eq!(events, vec!["a\nb".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_named_events_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: ping\ndata: x\n\nevent: message\ndata: y\n\n");
        assert_eq!(events, vec!["y".to_string()]);
    }

    #[test]
    fn test_incomplete_event_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial\n").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec!["partial".to_string()]);
    }
}
