//! Worker 协议集成测试：从入站消息到出站消息的完整流程

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use craft_worker::backend::{
    BackendLoader, BackendVariant, EngineSource, MockSolverEngine, SolverEngine,
    StaticEngineSource,
};
use craft_worker::capability::{CapabilityProbe, CapabilityProfile, StaticDetector};
use craft_worker::config::AppConfig;
use craft_worker::core::SchedulerState;
use craft_worker::protocol::{Inbound, Outbound, ProblemInput, StepReport};
use craft_worker::{spawn_worker, Worker};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn probe(result: Result<CapabilityProfile, String>) -> CapabilityProbe {
    CapabilityProbe::new(Arc::new(StaticDetector(result)), Duration::from_secs(1))
}

fn worker_with(source: Arc<dyn EngineSource>, detected: Result<CapabilityProfile, String>) -> Worker {
    let loader = BackendLoader::new(source, probe(detected)).with_threads(2);
    Worker::new(AppConfig::default(), loader)
}

fn mock_source(engine: MockSolverEngine) -> Arc<dyn EngineSource> {
    Arc::new(StaticEngineSource::new(Arc::new(engine)))
}

fn expect_progress(reply: Outbound) -> StepReport {
    match reply {
        Outbound::Progress(report) => report,
        other => panic!("Expected progress, got {other:?}"),
    }
}

/// 第一次获取失败，之后正常
struct FlakySource {
    failed_once: AtomicBool,
    fetches: AtomicUsize,
}

#[async_trait]
impl EngineSource for FlakySource {
    async fn fetch(&self, _variant: BackendVariant) -> Result<Arc<dyn SolverEngine>, String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err("solver module unavailable".to_string());
        }
        Ok(Arc::new(MockSolverEngine::new()))
    }
}

#[tokio::test]
async fn test_start_run_finish() {
    let mut worker = worker_with(
        mock_source(MockSolverEngine::new()),
        Ok(CapabilityProfile::new(true, true)),
    );

    let first = expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(20, 50)))
            .await,
    );
    assert_eq!(first.generations_completed, 1);
    assert_eq!(
        worker.backend().unwrap().variant(),
        BackendVariant::VectorizedParallel
    );
    assert!(first.warning.is_none());

    let mut last_best = first.best_score.unwrap();
    for expected in 2..=4 {
        let report = expect_progress(worker.handle(Inbound::RunGeneration).await);
        assert_eq!(report.generations_completed, expected);
        let best = report.best_score.unwrap();
        assert!(best >= last_best);
        last_best = best;
    }

    match worker.handle(Inbound::Finish).await {
        Outbound::Success(report) => {
            assert!(report.elapsed_time > 0);
            assert!(!report.best_sequence.is_empty());
            assert!(report.best_sequence.len() <= 20);
            assert!(report.execution_log.contains("Finished after 4 generations"));
        }
        other => panic!("Expected success, got {other:?}"),
    }
    assert_eq!(worker.scheduler().state(), SchedulerState::Finished);
}

#[tokio::test]
async fn test_unsupported_host_uses_scalar_backend() {
    let mut worker = worker_with(
        mock_source(MockSolverEngine::new()),
        Ok(CapabilityProfile::UNSUPPORTED),
    );
    let first = expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(10, 20)))
            .await,
    );
    assert!(first
        .warning
        .as_deref()
        .is_some_and(|w| w.contains("performance will be degraded")));
    let backend = worker.backend().unwrap();
    assert_eq!(backend.variant(), BackendVariant::Scalar);
    assert_eq!(backend.threads(), 1);

    let next = expect_progress(worker.handle(Inbound::RunGeneration).await);
    assert!(next.warning.is_none());
}

#[tokio::test]
async fn test_probe_failure_falls_back_to_parallel() {
    let mut worker = worker_with(
        mock_source(MockSolverEngine::new()),
        Err("probe unavailable".to_string()),
    );
    expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(10, 20)))
            .await,
    );
    assert_eq!(worker.backend().unwrap().variant(), BackendVariant::Parallel);
}

#[tokio::test]
async fn test_backend_load_failure_allows_retry() {
    let source = Arc::new(FlakySource {
        failed_once: AtomicBool::new(false),
        fetches: AtomicUsize::new(0),
    });
    let mut worker = worker_with(source.clone(), Ok(CapabilityProfile::new(true, false)));

    match worker
        .handle(Inbound::Start(ProblemInput::new(10, 20)))
        .await
    {
        Outbound::Error(report) => {
            assert!(report.error.contains("solver module unavailable"));
            assert!(report.execution_log.is_none());
        }
        other => panic!("Expected error, got {other:?}"),
    }
    assert!(worker.backend().is_none());
    assert_eq!(worker.scheduler().state(), SchedulerState::Idle);

    expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(10, 20)))
            .await,
    );
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

    // 已加载的后端被复用
    expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(10, 20)))
            .await,
    );
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_protocol_misuse() {
    let mut worker = worker_with(
        mock_source(MockSolverEngine::new()),
        Ok(CapabilityProfile::new(true, false)),
    );

    for message in [Inbound::Resume, Inbound::RunGeneration, Inbound::Finish] {
        let reply = worker.handle(message).await;
        assert!(reply.is_error());
    }

    expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(10, 20)))
            .await,
    );
    assert!(matches!(
        worker.handle(Inbound::Finish).await,
        Outbound::Success(_)
    ));

    match worker.handle(Inbound::RunGeneration).await {
        Outbound::Error(report) => {
            assert!(report.error.contains("already finished"));
            assert!(report.execution_log.is_some());
        }
        other => panic!("Expected error, got {other:?}"),
    }
    assert!(worker.handle(Inbound::Finish).await.is_error());
}

#[tokio::test]
async fn test_budget_exhaustion_and_resume() {
    let mut worker = worker_with(
        mock_source(MockSolverEngine::new()),
        Ok(CapabilityProfile::new(true, false)),
    );
    let input = ProblemInput::new(10, 20).with_generations(2);

    expect_progress(worker.handle(Inbound::Start(input)).await);
    let second = expect_progress(worker.handle(Inbound::RunGeneration).await);
    assert_eq!(second.generations_completed, 2);
    assert!(!second.exhausted);

    let paused = expect_progress(worker.handle(Inbound::RunGeneration).await);
    assert!(paused.exhausted);
    assert_eq!(paused.generations_completed, 2);
    assert_eq!(worker.scheduler().state(), SchedulerState::Paused);

    let resumed = expect_progress(worker.handle(Inbound::Resume).await);
    assert_eq!(resumed.generations_completed, 3);
    assert_eq!(resumed.max_generations, 4);
    assert_eq!(worker.scheduler().state(), SchedulerState::Active);
}

#[tokio::test]
async fn test_restart_discards_previous_session() {
    let mut worker = worker_with(
        mock_source(MockSolverEngine::new()),
        Ok(CapabilityProfile::new(true, false)),
    );

    expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(10, 20)))
            .await,
    );
    for _ in 0..3 {
        expect_progress(worker.handle(Inbound::RunGeneration).await);
    }

    let fresh = expect_progress(
        worker
            .handle(Inbound::Start(ProblemInput::new(5, 20)))
            .await,
    );
    assert_eq!(fresh.generations_completed, 1);
    assert!(fresh.best_sequence.len() <= 5);
}

#[tokio::test]
async fn test_wire_round_trip_through_channels() {
    let shutdown = CancellationToken::new();
    let worker = worker_with(
        mock_source(MockSolverEngine::new()),
        Ok(CapabilityProfile::new(true, false)),
    );
    let mut channels = spawn_worker(worker, shutdown.clone());

    let start = json!({
        "start": {
            "maxLength": 15,
            "populationSize": 30,
            "crafter": {"actions": ["reflect", "basicSynth", "groundwork"]},
            "solver": {"generations": 10}
        }
    });
    for raw in [start, json!("rungen"), json!("finish")] {
        let message: Inbound = serde_json::from_value(raw).unwrap();
        channels.inbound.send(message).unwrap();
    }

    let progress = serde_json::to_value(channels.outbound.recv().await.unwrap()).unwrap();
    assert_eq!(progress["progress"]["generationsCompleted"], 1);
    assert_eq!(progress["progress"]["maxGenerations"], 10);

    let progress = serde_json::to_value(channels.outbound.recv().await.unwrap()).unwrap();
    assert_eq!(progress["progress"]["generationsCompleted"], 2);

    let success = serde_json::to_value(channels.outbound.recv().await.unwrap()).unwrap();
    let sequence = success["success"]["bestSequence"].as_array().unwrap();
    assert!(!sequence.is_empty());
    assert!(sequence
        .iter()
        .all(|a| ["reflect", "basicSynth", "groundwork"].contains(&a.as_str().unwrap())));
    assert!(success["success"]["executionLog"].is_string());
    assert!(success["success"]["elapsedTime"].is_u64());

    drop(channels.inbound);
    channels.task.await.unwrap();
}
