//! BackendLoader：探测 -> 选择 -> 获取求解器 -> 构建后端
//!
//! 选择策略（优先级从高到低）：
//! 1. parallel && vectorized -> VectorizedParallel
//! 2. parallel -> Parallel
//! 3. 其余 -> Scalar（并警告性能下降）
//!
//! 探测设施本身不可用（出错/超时，而不是报告「不支持」）时直接回退到 Parallel。
//! 加载成功后缓存，后续会话复用；失败不缓存，下一次 Start 会重新尝试。

use std::sync::Arc;

use async_trait::async_trait;

use super::traits::SolverEngine;
use super::variant::{Backend, BackendVariant};
use crate::capability::{CapabilityProbe, Probed};
use crate::config::BackendSection;
use crate::core::WorkerError;

/// 求解器来源：相当于按变体动态获取并初始化求解模块
#[async_trait]
pub trait EngineSource: Send + Sync {
    async fn fetch(&self, variant: BackendVariant) -> Result<Arc<dyn SolverEngine>, String>;
}

/// 所有变体共用同一个求解器实现
pub struct StaticEngineSource {
    engine: Arc<dyn SolverEngine>,
}

impl StaticEngineSource {
    pub fn new(engine: Arc<dyn SolverEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EngineSource for StaticEngineSource {
    async fn fetch(&self, _variant: BackendVariant) -> Result<Arc<dyn SolverEngine>, String> {
        Ok(Arc::clone(&self.engine))
    }
}

/// 后端加载器：每个 Worker 持有一个，进程内至多成功加载一次
pub struct BackendLoader {
    source: Arc<dyn EngineSource>,
    probe: CapabilityProbe,
    forced: Option<BackendVariant>,
    threads: Option<usize>,
    loaded: Option<Arc<Backend>>,
}

impl BackendLoader {
    pub fn new(source: Arc<dyn EngineSource>, probe: CapabilityProbe) -> Self {
        Self {
            source,
            probe,
            forced: None,
            threads: None,
            loaded: None,
        }
    }

    /// 按 [backend] 配置段创建：force 跳过探测，threads 覆盖线程池大小
    pub fn from_config(
        section: &BackendSection,
        source: Arc<dyn EngineSource>,
        probe: CapabilityProbe,
    ) -> Result<Self, WorkerError> {
        let mut loader = Self::new(source, probe);
        if let Some(ref name) = section.force {
            let variant = name.parse::<BackendVariant>().map_err(WorkerError::Config)?;
            loader = loader.with_forced(variant);
        }
        if let Some(threads) = section.threads {
            loader = loader.with_threads(threads);
        }
        Ok(loader)
    }

    pub fn with_forced(mut self, variant: BackendVariant) -> Self {
        self.forced = Some(variant);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    /// 选择策略
    pub fn select(probed: &Probed) -> BackendVariant {
        match probed {
            Probed::Unavailable(_) => BackendVariant::Parallel,
            Probed::Detected(profile) if profile.parallel && profile.vectorized => {
                BackendVariant::VectorizedParallel
            }
            Probed::Detected(profile) if profile.parallel => BackendVariant::Parallel,
            Probed::Detected(_) => BackendVariant::Scalar,
        }
    }

    /// 已加载的后端
    pub fn loaded(&self) -> Option<&Arc<Backend>> {
        self.loaded.as_ref()
    }

    pub fn probe(&self) -> &CapabilityProbe {
        &self.probe
    }

    /// 确保后端已加载；已加载时直接返回，不会重新初始化
    pub async fn load(&mut self) -> Result<Arc<Backend>, WorkerError> {
        if let Some(backend) = &self.loaded {
            return Ok(Arc::clone(backend));
        }

        let variant = match self.forced {
            Some(variant) => {
                tracing::info!("Backend forced by config: {}", variant);
                variant
            }
            None => {
                let probed = self.probe.probe().await;
                if let Probed::Unavailable(ref reason) = probed {
                    tracing::warn!(
                        "Capability detection unavailable ({}), assuming parallel support",
                        reason
                    );
                }
                Self::select(&probed)
            }
        };

        if variant == BackendVariant::Scalar {
            tracing::warn!("Host lacks parallel support, using scalar backend; performance will be degraded");
        }

        let engine = self
            .source
            .fetch(variant)
            .await
            .map_err(WorkerError::BackendLoad)?;

        let threads = self.threads.unwrap_or_else(hardware_concurrency);
        // 建线程池会启动 OS 线程，放到阻塞线程上做
        let backend = tokio::task::spawn_blocking(move || Backend::build(variant, engine, threads))
            .await
            .map_err(|e| WorkerError::BackendLoad(format!("backend initialisation panicked: {e}")))?
            .map_err(WorkerError::BackendLoad)?;

        tracing::info!(
            variant = %backend.variant(),
            engine = backend.engine_name(),
            threads = backend.threads(),
            "Backend loaded"
        );

        let backend = Arc::new(backend);
        self.loaded = Some(Arc::clone(&backend));
        Ok(backend)
    }
}

/// 宿主报告的硬件并发数，无法判断时为 1
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
