//! 求解后端：不透明的求解能力 + 三种可互换的执行变体
//!
//! - **traits**: SolverEngine / Solver，外部求解器实现的能力面（create / step / finalize）
//! - **variant**: BackendVariant 与 Backend（执行上下文、并行变体的私有线程池）
//! - **loader**: 根据能力探测结果选择并加载唯一的后端，进程内只加载一次
//! - **mock**: 确定性的 Mock 求解器（测试与演示用，无需真实求解器）

pub mod loader;
pub mod mock;
pub mod traits;
pub mod variant;

pub use loader::{BackendLoader, EngineSource, StaticEngineSource};
pub use mock::MockSolverEngine;
pub use traits::{ExecutionContext, GenerationOutcome, Solver, SolverEngine};
pub use variant::{Backend, BackendVariant, SolverHandle};
