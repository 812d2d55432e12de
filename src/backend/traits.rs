//! 求解能力抽象
//!
//! Worker 不关心遗传算子、适应度或模拟规则：只通过 create / step / finalize 驱动求解器。
//! 错误以字符串返回，由调度器映射为 StepFailed。

use serde_json::Value;

use super::variant::BackendVariant;
use crate::core::Candidate;
use crate::protocol::ProblemInput;

/// 交给求解器的执行上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub variant: BackendVariant,
    /// 私有线程池大小；Scalar 为 1
    pub threads: usize,
    pub vectorized: bool,
}

impl ExecutionContext {
    pub fn parallel(&self) -> bool {
        self.variant.is_parallel()
    }
}

/// 一代（或收尾）的结果
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    /// 后端自定义的进度数据，原样转发给控制端
    pub metrics: Value,
    /// 求解器当前的最优候选
    pub best: Option<Candidate>,
}

/// 求解器工厂：为每个会话创建独立的求解实例
pub trait SolverEngine: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        input: &ProblemInput,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn Solver>, String>;
}

/// 单个会话的求解实例
pub trait Solver: Send {
    /// 计算一代
    fn step(&mut self) -> Result<GenerationOutcome, String>;

    /// 收尾：整理内部状态并给出当前最优。
    ///
    /// 不得再推进一代：调度器不会为 finalize 计数，多跑的一代会越过 maxGeneration。
    fn finalize(&mut self) -> Result<GenerationOutcome, String>;
}
