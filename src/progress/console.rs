//! 渲染回调
//!
//! 编排器在每次状态变化和每条进度消息应用后调用渲染器，
//! 渲染器只读会话，不持有任何全局状态

use crate::progress::render::NoticeLevel;
use crate::uploader::session::{SessionState, UploadSession};
use std::io::Write;

/// 进度条宽度（字符）
const BAR_WIDTH: usize = 30;

/// 渲染回调
pub trait ProgressRenderer: Send {
    /// `session` 为 None 表示当前没有会话（空闲）
    fn render(&mut self, state: SessionState, session: Option<&UploadSession>);
}

impl<F> ProgressRenderer for F
where
    F: FnMut(SessionState, Option<&UploadSession>) + Send,
{
    fn render(&mut self, state: SessionState, session: Option<&UploadSession>) {
        self(state, session)
    }
}

/// 终端进度条
pub struct ConsoleRenderer<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, state: SessionState, session: Option<&UploadSession>) -> std::io::Result<()> {
        let Some(session) = session else {
            return writeln!(self.out, "[{:?}]", state);
        };

        writeln!(
            self.out,
            "[{:?}] {} ({} bytes, {})",
            state,
            session.candidate.name,
            session.candidate.size_bytes,
            session.strategy()
        )?;

        for record in session.progress.records() {
            let filled = ((record.percentage / 100.0) * BAR_WIDTH as f64).round() as usize;
            let filled = filled.min(BAR_WIDTH);
            writeln!(
                self.out,
                "  part-{:<3} [{}{}] {:>6}",
                record.part_number,
                "#".repeat(filled),
                ".".repeat(BAR_WIDTH - filled),
                record.label()
            )?;
        }

        for notice in session.progress.notices() {
            let prefix = match notice.level {
                NoticeLevel::Info => "",
                NoticeLevel::Error => "! ",
            };
            writeln!(self.out, "  {}{}", prefix, notice.text)?;
        }

        if let Some(receipt) = &session.receipt {
            if receipt.file_url.is_empty() {
                writeln!(self.out, "  -> {}", receipt.object_key)?;
            } else {
                writeln!(self.out, "  -> {} ({})", receipt.object_key, receipt.file_url)?;
            }
        }

        self.out.flush()
    }
}

impl<W: Write + Send> ProgressRenderer for ConsoleRenderer<W> {
    fn render(&mut self, state: SessionState, session: Option<&UploadSession>) {
        // 终端写入失败不影响上传流程
        if let Err(e) = self.draw(state, session) {
            tracing::debug!("渲染进度失败: {}", e);
        }
    }
}
