//! 核心层：错误、名人堂、执行日志、计算会话、代际调度

pub mod error;
pub mod hall_of_fame;
pub mod log_buffer;
pub mod scheduler;
pub mod session;

pub use error::WorkerError;
pub use hall_of_fame::{Candidate, HallOfFame};
pub use log_buffer::LogBuffer;
pub use scheduler::{GenerationScheduler, SchedulerState, StepResult};
pub use session::{ComputationSession, SessionPhase, SessionSettings, SessionState};
