//! Worker 错误类型
//!
//! 每个入站消息的处理函数都返回 `Result<Outbound, WorkerError>`，
//! 由 Worker 的唯一分发点统一映射为 ErrorReport；没有错误会被吞掉，也不做自动重试。

use thiserror::Error;

/// Worker 处理消息时可能出现的错误
#[derive(Error, Debug)]
pub enum WorkerError {
    /// 后端加载失败：触发它的 Start 失败，Worker 仍可接受下一次 Start
    #[error("Backend load failed: {0}")]
    BackendLoad(String),

    /// 推进一代（或收尾）时求解器报错；会话保持在最后一次成功的步进
    #[error("Generation step failed: {0}")]
    StepFailed(String),

    /// 没有活跃会话时收到 Resume / RunGeneration / Finish
    #[error("No active session; send a start message first")]
    NoActiveSession,

    /// 会话已 Finish，只能用新的 Start 重新开始
    #[error("Session already finished; send a start message to begin a new one")]
    SessionFinished,

    #[error("Invalid problem input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl WorkerError {
    /// 协议误用（控制端消息顺序错误），与求解器本身的失败区分
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(self, WorkerError::NoActiveSession | WorkerError::SessionFinished)
    }
}
