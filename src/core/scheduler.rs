//! GenerationScheduler：代际步进状态机
//!
//! Idle -> Active -> (Paused) -> Active -> Finished；任意状态下 Start 都会用全新会话回到 Active。
//!
//! 每次步进都把求解句柄移入 `spawn_blocking`，完成后再移回；一次只有一个步进在执行，
//! 步进一旦开始就跑完，没有取消。

use std::sync::Arc;

use serde_json::Value;

use super::error::WorkerError;
use super::hall_of_fame::Candidate;
use super::session::{ComputationSession, SessionPhase, SessionSettings};
use crate::backend::{Backend, GenerationOutcome};
use crate::format::ActionFormatter;
use crate::protocol::{FinishReport, ProblemInput, StepReport};

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// 没有会话
    Idle,
    Active,
    Paused,
    Finished,
}

/// 单次步进请求的结果
#[derive(Debug, Clone)]
pub enum StepResult {
    /// 推进了一代；刷新最优时带上新的榜首
    Progress {
        metrics: Value,
        new_best: Option<Candidate>,
    },
    /// 预算耗尽，没有推进
    Exhausted,
}

/// 代际调度器：持有唯一的会话
#[derive(Debug, Default)]
pub struct GenerationScheduler {
    session: Option<ComputationSession>,
}

impl GenerationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        match &self.session {
            None => SchedulerState::Idle,
            Some(s) => match s.phase {
                SessionPhase::Active => SchedulerState::Active,
                SessionPhase::Paused => SchedulerState::Paused,
                SessionPhase::Finished => SchedulerState::Finished,
            },
        }
    }

    pub fn session(&self) -> Option<&ComputationSession> {
        self.session.as_ref()
    }

    /// 当前会话的执行日志（用于错误报告）；没有会话时为 None
    pub fn execution_log(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|s| s.state.execution_log.render())
    }

    /// 丢弃旧会话、创建新会话并推进第一代
    pub async fn start(
        &mut self,
        backend: Arc<Backend>,
        input: ProblemInput,
        settings: SessionSettings,
    ) -> Result<StepReport, WorkerError> {
        if let Some(old) = self.session.take() {
            tracing::info!(
                session = %old.state.id,
                generation = old.state.generation,
                "Discarding previous session"
            );
        }

        let creator = Arc::clone(&backend);
        let session = tokio::task::spawn_blocking(move || {
            ComputationSession::create(&creator, &input, settings)
        })
        .await
        .map_err(|e| WorkerError::StepFailed(format!("solver creation panicked: {e}")))??;

        tracing::info!(
            session = %session.state.id,
            max_generation = session.state.max_generation,
            "Session started"
        );
        self.session = Some(session);
        let warning = backend.degraded_warning();
        let mut report = self.step(backend).await?;
        report.warning = warning.map(str::to_string);
        Ok(report)
    }

    /// 推进恰好一代；预算耗尽时不推进，转为 Paused
    pub async fn run_generation(&mut self, backend: Arc<Backend>) -> Result<StepReport, WorkerError> {
        let session = self.live_session()?;
        if session.state.budget_exhausted() {
            session.phase = SessionPhase::Paused;
            tracing::debug!(
                generation = session.state.generation,
                "Generation budget exhausted, waiting for resume"
            );
            return Ok(Self::report(session, StepResult::Exhausted));
        }
        self.step(backend).await
    }

    /// 预算耗尽时先追加一轮预算，再推进一代。
    /// 步进失败时预算和阶段回到 Resume 之前，会话停在最后一次成功的步进。
    pub async fn resume(&mut self, backend: Arc<Backend>) -> Result<StepReport, WorkerError> {
        let session = self.live_session()?;
        let previous_budget = session.state.max_generation;
        let previous_phase = session.phase;
        if session.state.budget_exhausted() {
            let raised = session.state.raise_budget();
            session
                .state
                .execution_log
                .push(format!("Resumed: generation budget raised to {raised}"));
            tracing::info!(max_generation = raised, "Generation budget raised");
        }
        session.phase = SessionPhase::Active;

        let result = self.step(backend).await;
        if result.is_err() {
            if let Some(session) = self.session.as_mut() {
                if session.state.max_generation != previous_budget {
                    session.state.max_generation = previous_budget;
                    session
                        .state
                        .execution_log
                        .push(format!("Resume reverted: generation budget back to {previous_budget}"));
                }
                session.phase = previous_phase;
            }
        }
        result
    }

    /// 收尾一次，返回最终结果并进入 Finished
    pub async fn finish(
        &mut self,
        backend: Arc<Backend>,
        formatter: &dyn ActionFormatter,
    ) -> Result<FinishReport, WorkerError> {
        let session = self.live_session()?;
        let mut handle = session.take_handle().ok_or_else(Self::handle_lost)?;

        let joined = tokio::task::spawn_blocking(move || {
            let result = backend.finalize(&mut handle);
            (handle, result)
        })
        .await;

        let outcome = match joined {
            Err(e) => {
                session
                    .state
                    .execution_log
                    .push(format!("ERROR: solver panicked while finishing: {e}"));
                return Err(WorkerError::StepFailed(format!("solver panicked while finishing: {e}")));
            }
            Ok((handle, Err(e))) => {
                session.restore_handle(handle);
                session
                    .state
                    .execution_log
                    .push(format!("ERROR: finalize failed: {e}"));
                return Err(WorkerError::StepFailed(e));
            }
            Ok((_, Ok(outcome))) => outcome,
        };

        if let Some(best) = outcome.best {
            session.state.hall_of_fame.record(best);
        }
        let best = session
            .state
            .hall_of_fame
            .top()
            .cloned()
            .ok_or_else(|| WorkerError::StepFailed("no candidate was produced in this session".into()))?;

        let elapsed = session.state.elapsed_ms();
        session.state.execution_log.push(format!(
            "Finished after {} generations in {} ms, best score {} ({} actions)",
            session.state.generation,
            elapsed,
            best.score,
            best.action_sequence.len()
        ));
        session.phase = SessionPhase::Finished;
        session.release_handle();

        tracing::info!(
            session = %session.state.id,
            generation = session.state.generation,
            elapsed_ms = elapsed,
            best_score = best.score,
            "Session finished"
        );

        Ok(FinishReport {
            execution_log: session.state.execution_log.render(),
            elapsed_time: elapsed,
            best_sequence: formatter.short_names(&best.action_sequence),
        })
    }

    /// 非 Start 消息的前置检查：必须有会话且尚未 Finish
    fn live_session(&mut self) -> Result<&mut ComputationSession, WorkerError> {
        match self.session.as_mut() {
            None => Err(WorkerError::NoActiveSession),
            Some(s) if s.phase == SessionPhase::Finished => Err(WorkerError::SessionFinished),
            Some(s) => Ok(s),
        }
    }

    fn handle_lost() -> WorkerError {
        WorkerError::StepFailed(
            "solver handle is no longer available; send a start message to begin a new session"
                .into(),
        )
    }

    async fn step(&mut self, backend: Arc<Backend>) -> Result<StepReport, WorkerError> {
        let session = self.live_session()?;
        let mut handle = session.take_handle().ok_or_else(Self::handle_lost)?;
        let next_generation = session.state.generation + 1;

        let joined = tokio::task::spawn_blocking(move || {
            let result = backend.step(&mut handle);
            (handle, result)
        })
        .await;

        let outcome: GenerationOutcome = match joined {
            Err(e) => {
                session
                    .state
                    .execution_log
                    .push(format!("ERROR: solver panicked at gen {next_generation}: {e}"));
                tracing::error!(generation = next_generation, "Solver panicked: {}", e);
                return Err(WorkerError::StepFailed(format!("solver panicked: {e}")));
            }
            Ok((handle, Err(e))) => {
                session.restore_handle(handle);
                session
                    .state
                    .execution_log
                    .push(format!("ERROR: gen {next_generation} failed: {e}"));
                return Err(WorkerError::StepFailed(e));
            }
            Ok((handle, Ok(outcome))) => {
                session.restore_handle(handle);
                outcome
            }
        };

        session.state.generation = next_generation;
        let mut new_best = None;
        if let Some(candidate) = outcome.best {
            if session.state.hall_of_fame.record(candidate.clone()) {
                new_best = Some(candidate);
            }
        }

        let state = &mut session.state;
        match state.hall_of_fame.top() {
            Some(top) => {
                let actions: Vec<&str> = top.action_sequence.iter().map(|a| a.name()).collect();
                let line = format!(
                    "gen: {}/{}, best score {}, actions {:?}",
                    state.generation, state.max_generation, top.score, actions
                );
                state.execution_log.push(line);
            }
            None => {
                let line = format!(
                    "gen: {}/{}, no candidate yet",
                    state.generation, state.max_generation
                );
                state.execution_log.push(line);
            }
        }
        tracing::debug!(
            generation = state.generation,
            max_generation = state.max_generation,
            best_score = ?state.hall_of_fame.best_score(),
            improved = new_best.is_some(),
            "Generation completed"
        );

        Ok(Self::report(
            session,
            StepResult::Progress {
                metrics: outcome.metrics,
                new_best,
            },
        ))
    }

    fn report(session: &ComputationSession, result: StepResult) -> StepReport {
        let state = &session.state;
        let (improved, exhausted, metrics) = match result {
            StepResult::Progress { metrics, new_best } => (new_best.is_some(), false, metrics),
            StepResult::Exhausted => (false, true, Value::Null),
        };
        StepReport {
            generations_completed: state.generation,
            max_generations: state.max_generation,
            best_score: state.hall_of_fame.best_score(),
            best_sequence: state
                .hall_of_fame
                .top()
                .map(|c| c.action_sequence.clone())
                .unwrap_or_default(),
            improved,
            exhausted,
            metrics,
            warning: None,
        }
    }
}
