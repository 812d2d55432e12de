//! 会话执行日志（随 FinishReport / ErrorReport 返回给控制端）

use std::collections::VecDeque;

/// 按行保存、总字节数有上限的日志；超出时丢弃最早的行
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    bytes: usize,
    max_bytes: usize,
    dropped: usize,
}

impl LogBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_bytes: max_bytes.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        // 至少保留最新一行
        while self.bytes > self.max_bytes && self.lines.len() > 1 {
            if let Some(old) = self.lines.pop_front() {
                self.bytes -= old.len() + 1;
                self.dropped += 1;
            }
        }
    }

    /// 被截断丢弃的行数
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.bytes + 48);
        if self.dropped > 0 {
            out.push_str(&format!("[{} earlier lines truncated]\n", self.dropped));
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
