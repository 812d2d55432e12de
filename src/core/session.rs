//! 计算会话：求解句柄 + 每会话簿记（代数计数、执行日志、名人堂）
//!
//! 同一时刻至多一个会话；新的 Start 整体替换旧会话（不合并、不继承任何状态）。

use std::time::Instant;

use chrono::{DateTime, Utc};

use super::error::WorkerError;
use super::hall_of_fame::HallOfFame;
use super::log_buffer::LogBuffer;
use crate::backend::{Backend, SolverHandle};
use crate::config::AppConfig;
use crate::protocol::{ProblemInput, SolverSettings};

/// 会话参数：配置默认值 + 输入覆盖
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_length: u32,
    pub population_size: u32,
    /// 初始 maxGeneration
    pub generations: u64,
    /// Resume 时 maxGeneration 的增量
    pub resume_increment: u64,
    pub hall_of_fame_size: usize,
    pub max_log_bytes: usize,
    pub solver: SolverSettings,
}

impl SessionSettings {
    /// 输入里的 solver.generations 同时决定初始预算和续跑增量
    pub fn resolve(cfg: &AppConfig, input: &ProblemInput) -> Self {
        let (generations, resume_increment) = match input.generations() {
            Some(g) => (g, g),
            None => (cfg.solver.generations, cfg.solver.increment()),
        };
        Self {
            max_length: input.max_length,
            population_size: input.population_size,
            generations: generations.max(1),
            resume_increment: resume_increment.max(1),
            hall_of_fame_size: cfg.worker.hall_of_fame_size,
            max_log_bytes: cfg.worker.max_log_bytes,
            solver: input.solver.clone().unwrap_or_default(),
        }
    }
}

/// 会话阶段；没有会话即 Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    /// 预算耗尽，等待 Resume
    Paused,
    /// 已 Finish，终态
    Finished,
}

/// 会话簿记
#[derive(Debug)]
pub struct SessionState {
    pub id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub generation: u64,
    pub max_generation: u64,
    pub settings: SessionSettings,
    pub execution_log: LogBuffer,
    pub hall_of_fame: HallOfFame,
}

impl SessionState {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            generation: 0,
            max_generation: settings.generations,
            execution_log: LogBuffer::new(settings.max_log_bytes),
            hall_of_fame: HallOfFame::new(settings.hall_of_fame_size),
            settings,
        }
    }

    /// 从会话开始到现在的毫秒数，不足 1 ms 向上取整；跑过至少一代后不会为 0
    pub fn elapsed_ms(&self) -> u64 {
        let millis = self.started.elapsed().as_micros().div_ceil(1000) as u64;
        if self.generation > 0 {
            millis.max(1)
        } else {
            millis
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.generation >= self.max_generation
    }

    /// 追加一轮预算，返回新的 maxGeneration
    pub fn raise_budget(&mut self) -> u64 {
        self.max_generation += self.settings.resume_increment;
        self.max_generation
    }
}

/// 活跃会话：求解句柄的生命周期不超过会话本身
#[derive(Debug)]
pub struct ComputationSession {
    pub state: SessionState,
    pub phase: SessionPhase,
    handle: Option<SolverHandle>,
}

impl ComputationSession {
    /// 用已加载的后端创建新会话：generation=0、名人堂与日志为空
    pub fn create(
        backend: &Backend,
        input: &ProblemInput,
        settings: SessionSettings,
    ) -> Result<Self, WorkerError> {
        input.validate().map_err(WorkerError::InvalidInput)?;

        let handle = backend
            .create(input)
            .map_err(|e| WorkerError::StepFailed(format!("failed to create solver: {e}")))?;

        let mut state = SessionState::new(settings);
        state.execution_log.push(format!(
            "Session {} started at {} on {} backend ({} threads, engine {})",
            state.id,
            state.started_at.to_rfc3339(),
            backend.variant(),
            backend.threads(),
            backend.engine_name()
        ));
        state.execution_log.push(format!(
            "maxLength={} populationSize={} generations={}",
            state.settings.max_length, state.settings.population_size, state.max_generation
        ));
        if let Some(warning) = backend.degraded_warning() {
            state.execution_log.push(format!("WARNING: {warning}"));
        }

        Ok(Self {
            state,
            phase: SessionPhase::Active,
            handle: Some(handle),
        })
    }

    /// 取出句柄交给阻塞线程；求解器崩溃后句柄不会被放回
    pub fn take_handle(&mut self) -> Option<SolverHandle> {
        self.handle.take()
    }

    pub fn restore_handle(&mut self, handle: SolverHandle) {
        self.handle = Some(handle);
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Finish 后释放求解器资源，簿记保留到下一次 Start
    pub fn release_handle(&mut self) {
        self.handle = None;
    }
}
