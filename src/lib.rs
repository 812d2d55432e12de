//! Craft Worker - 制作序列遗传求解器的后台执行上下文
//!
//! 模块划分：
//! - **backend**: 求解引擎抽象、三种后端变体、后端加载器与 Mock 求解器
//! - **capability**: 宿主能力探测（并行 / 向量指令），结果缓存
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话、名人堂、执行日志、代际调度状态机与错误类型
//! - **format**: 动作序列的简称格式化
//! - **host**: stdin/stdout 风格的 JSON Lines 宿主循环
//! - **observability**: 日志初始化（stderr）
//! - **protocol**: 控制端与 Worker 之间的消息类型
//! - **worker**: 顶层 Actor：逐条消费入站消息，每条恰好回复一条

pub mod backend;
pub mod capability;
pub mod config;
pub mod core;
pub mod format;
pub mod host;
pub mod observability;
pub mod protocol;
pub mod worker;

pub use core::WorkerError;
pub use protocol::{Inbound, Outbound, ProblemInput};
pub use worker::{spawn_worker, Worker, WorkerChannels};
