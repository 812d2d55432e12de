//! 后端变体：VectorizedParallel / Parallel / Scalar
//!
//! 三者暴露相同的能力面；并行变体在私有 rayon 线程池里执行 create / step / finalize，
//! 这层并发对调度器不可见，调度器把一次 step 当成一个原子的阻塞单元。

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use super::traits::{ExecutionContext, GenerationOutcome, Solver, SolverEngine};
use crate::protocol::ProblemInput;

/// 后端变体，进程内选定后不再切换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendVariant {
    /// 并行 + 向量指令
    VectorizedParallel,
    /// 仅并行
    Parallel,
    /// 单线程回退
    Scalar,
}

impl BackendVariant {
    pub fn is_parallel(&self) -> bool {
        matches!(self, BackendVariant::VectorizedParallel | BackendVariant::Parallel)
    }

    pub fn is_vectorized(&self) -> bool {
        matches!(self, BackendVariant::VectorizedParallel)
    }
}

impl std::fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendVariant::VectorizedParallel => write!(f, "vectorized-parallel"),
            BackendVariant::Parallel => write!(f, "parallel"),
            BackendVariant::Scalar => write!(f, "scalar"),
        }
    }
}

impl FromStr for BackendVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "vectorized-parallel" | "simd-parallel" => Ok(BackendVariant::VectorizedParallel),
            "parallel" => Ok(BackendVariant::Parallel),
            "scalar" => Ok(BackendVariant::Scalar),
            other => Err(format!("unknown backend variant '{other}'")),
        }
    }
}

/// 会话独占的求解句柄；丢弃即释放求解器资源
pub struct SolverHandle {
    solver: Box<dyn Solver>,
}

impl std::fmt::Debug for SolverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverHandle").finish_non_exhaustive()
    }
}

/// 已加载、可直接使用的后端
pub struct Backend {
    variant: BackendVariant,
    engine: Arc<dyn SolverEngine>,
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("variant", &self.variant)
            .field("engine", &self.engine.name())
            .field("threads", &self.threads)
            .finish()
    }
}

impl Backend {
    /// 构建后端；并行变体会启动大小为 threads 的私有线程池
    pub fn build(
        variant: BackendVariant,
        engine: Arc<dyn SolverEngine>,
        threads: usize,
    ) -> Result<Self, String> {
        let (pool, threads) = if variant.is_parallel() {
            let threads = threads.max(1);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("solver-{i}"))
                .build()
                .map_err(|e| format!("failed to build solver thread pool: {e}"))?;
            (Some(pool), threads)
        } else {
            (None, 1)
        };

        Ok(Self {
            variant,
            engine,
            pool,
            threads,
        })
    }

    pub fn variant(&self) -> BackendVariant {
        self.variant
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Scalar 回退意味着性能下降，需要让用户看到
    pub fn degraded_warning(&self) -> Option<&'static str> {
        match self.variant {
            BackendVariant::Scalar => Some(
                "parallel execution is unavailable on this host; running the scalar backend, performance will be degraded",
            ),
            _ => None,
        }
    }

    pub fn context(&self) -> ExecutionContext {
        ExecutionContext {
            variant: self.variant,
            threads: self.threads,
            vectorized: self.variant.is_vectorized(),
        }
    }

    fn run<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    pub fn create(&self, input: &ProblemInput) -> Result<SolverHandle, String> {
        let ctx = self.context();
        let solver = self.run(|| self.engine.create(input, &ctx))?;
        Ok(SolverHandle { solver })
    }

    pub fn step(&self, handle: &mut SolverHandle) -> Result<GenerationOutcome, String> {
        self.run(|| handle.solver.step())
    }

    pub fn finalize(&self, handle: &mut SolverHandle) -> Result<GenerationOutcome, String> {
        self.run(|| handle.solver.finalize())
    }
}
