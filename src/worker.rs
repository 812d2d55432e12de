//! Worker：后台执行上下文的顶层 Actor
//!
//! Worker 是一个显式拥有全部状态的结构体（后端加载器 + 调度器 + 格式化器），没有全局变量。
//! `spawn_worker` 在后台任务里逐条消费入站消息：上一条处理完（包括首次 Start 的探测与加载）
//! 之前不会分发下一条，每条入站消息恰好产生一条出站消息。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendLoader, EngineSource};
use crate::capability::CapabilityProbe;
use crate::config::AppConfig;
use crate::core::{GenerationScheduler, SessionSettings, WorkerError};
use crate::format::{ActionFormatter, ShortNameFormatter};
use crate::protocol::{Inbound, Outbound, ProblemInput};

/// Worker 状态：进程内唯一
pub struct Worker {
    config: AppConfig,
    loader: BackendLoader,
    scheduler: GenerationScheduler,
    formatter: Arc<dyn ActionFormatter>,
}

impl Worker {
    pub fn new(config: AppConfig, loader: BackendLoader) -> Self {
        Self {
            config,
            loader,
            scheduler: GenerationScheduler::new(),
            formatter: Arc::new(ShortNameFormatter::new()),
        }
    }

    /// 按配置创建：宿主能力探测 + [backend] 段的强制变体与线程数
    pub fn from_config(
        config: AppConfig,
        source: Arc<dyn EngineSource>,
    ) -> Result<Self, WorkerError> {
        let probe = CapabilityProbe::host(std::time::Duration::from_millis(
            config.worker.probe_timeout_ms,
        ));
        let loader = BackendLoader::from_config(&config.backend, source, probe)?;
        Ok(Self::new(config, loader))
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn ActionFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn scheduler(&self) -> &GenerationScheduler {
        &self.scheduler
    }

    pub fn backend(&self) -> Option<&Arc<Backend>> {
        self.loader.loaded()
    }

    /// 唯一的分发点：所有错误在这里统一映射为 ErrorReport
    pub async fn handle(&mut self, message: Inbound) -> Outbound {
        let kind = message.kind();
        match self.dispatch(message).await {
            Ok(outbound) => outbound,
            Err(e) => {
                if e.is_protocol_misuse() {
                    tracing::warn!(message = kind, "Rejected message: {}", e);
                } else {
                    tracing::error!(message = kind, "Handler failed: {}", e);
                }
                Outbound::error(e.to_string(), self.scheduler.execution_log())
            }
        }
    }

    async fn dispatch(&mut self, message: Inbound) -> Result<Outbound, WorkerError> {
        match message {
            Inbound::Start(input) => self.start(input).await,
            Inbound::RunGeneration => {
                let backend = self.session_backend()?;
                self.scheduler
                    .run_generation(backend)
                    .await
                    .map(Outbound::Progress)
            }
            Inbound::Resume => {
                let backend = self.session_backend()?;
                self.scheduler.resume(backend).await.map(Outbound::Progress)
            }
            Inbound::Finish => {
                let backend = self.session_backend()?;
                let formatter = Arc::clone(&self.formatter);
                self.scheduler
                    .finish(backend, formatter.as_ref())
                    .await
                    .map(Outbound::Success)
            }
        }
    }

    /// 探测 -> 加载（仅首次）-> 建会话 -> 推进第一代，顺序由 await 链保证
    async fn start(&mut self, input: ProblemInput) -> Result<Outbound, WorkerError> {
        input.validate().map_err(WorkerError::InvalidInput)?;
        let backend = self.loader.load().await?;
        let settings = SessionSettings::resolve(&self.config, &input);
        self.scheduler
            .start(backend, input, settings)
            .await
            .map(Outbound::Progress)
    }

    /// 没有加载过后端就不可能有会话
    fn session_backend(&self) -> Result<Arc<Backend>, WorkerError> {
        self.loader
            .loaded()
            .cloned()
            .ok_or(WorkerError::NoActiveSession)
    }
}

/// 后台 Worker 的通道端点
pub struct WorkerChannels {
    /// 控制端 -> Worker
    pub inbound: mpsc::UnboundedSender<Inbound>,
    /// Worker -> 控制端
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub task: JoinHandle<()>,
}

/// 在后台任务中运行 Worker；入站通道关闭或 shutdown 触发时退出。
/// shutdown 只在两条消息之间生效，正在执行的步进总会跑完。
pub fn spawn_worker(mut worker: Worker, shutdown: CancellationToken) -> WorkerChannels {
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<Inbound>();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Outbound>();

    let task = tokio::spawn(async move {
        tracing::info!("Worker started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Worker shutting down");
                    break;
                }
                message = inbound_rx.recv() => {
                    let Some(message) = message else {
                        break; // 控制端已关闭
                    };
                    let reply = worker.handle(message).await;
                    if outbound_tx.send(reply).is_err() {
                        break;
                    }
                }
            }
        }
    });

    WorkerChannels {
        inbound: inbound_tx,
        outbound: outbound_rx,
        task,
    }
}
