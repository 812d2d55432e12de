//! CapabilityProbe：异步探测 + 进程级缓存

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::OnceCell;

/// 宿主能力画像，探测后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityProfile {
    pub parallel: bool,
    pub vectorized: bool,
}

impl CapabilityProfile {
    /// 保守画像：什么都不支持
    pub const UNSUPPORTED: CapabilityProfile = CapabilityProfile {
        parallel: false,
        vectorized: false,
    };

    pub fn new(parallel: bool, vectorized: bool) -> Self {
        Self {
            parallel,
            vectorized,
        }
    }
}

/// 宿主能力查询设施：返回 Err 表示「无法判断」，而不是「不支持」
#[async_trait]
pub trait CapabilityDetector: Send + Sync {
    async fn detect(&self) -> Result<CapabilityProfile, String>;
}

/// 基于标准库的宿主探测：硬件并发数 > 1 视为支持并行；AVX2 / NEON / simd128 视为支持向量指令
#[derive(Debug, Default)]
pub struct HostDetector;

impl HostDetector {
    fn vector_support() -> bool {
        #[cfg(target_arch = "x86_64")]
        let supported = std::is_x86_feature_detected!("avx2");
        #[cfg(target_arch = "aarch64")]
        let supported = std::arch::is_aarch64_feature_detected!("neon");
        #[cfg(target_arch = "wasm32")]
        let supported = cfg!(target_feature = "simd128");
        #[cfg(not(any(
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "wasm32"
        )))]
        let supported = false;
        supported
    }
}

#[async_trait]
impl CapabilityDetector for HostDetector {
    async fn detect(&self) -> Result<CapabilityProfile, String> {
        let threads = std::thread::available_parallelism()
            .map_err(|e| format!("cannot determine hardware concurrency: {e}"))?
            .get();
        Ok(CapabilityProfile {
            parallel: threads > 1,
            vectorized: Self::vector_support(),
        })
    }
}

/// 固定结果的探测器（配置覆盖、测试）
#[derive(Debug, Clone)]
pub struct StaticDetector(pub Result<CapabilityProfile, String>);

#[async_trait]
impl CapabilityDetector for StaticDetector {
    async fn detect(&self) -> Result<CapabilityProfile, String> {
        self.0.clone()
    }
}

/// 探测结果：区分「探测到了（可能全为 false）」与「探测设施不可用」
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probed {
    Detected(CapabilityProfile),
    Unavailable(String),
}

impl Probed {
    /// 不可用时保守地报告 parallel=false, vectorized=false
    pub fn profile(&self) -> CapabilityProfile {
        match self {
            Probed::Detected(profile) => *profile,
            Probed::Unavailable(_) => CapabilityProfile::UNSUPPORTED,
        }
    }
}

/// 能力探测：至多执行一次，结果缓存到进程结束
pub struct CapabilityProbe {
    detector: Arc<dyn CapabilityDetector>,
    timeout: Duration,
    cached: OnceCell<Probed>,
}

impl CapabilityProbe {
    pub fn new(detector: Arc<dyn CapabilityDetector>, timeout: Duration) -> Self {
        Self {
            detector,
            timeout,
            cached: OnceCell::new(),
        }
    }

    pub fn host(timeout: Duration) -> Self {
        Self::new(Arc::new(HostDetector), timeout)
    }

    pub async fn probe(&self) -> Probed {
        self.cached
            .get_or_init(|| async {
                match tokio::time::timeout(self.timeout, self.detector.detect()).await {
                    Ok(Ok(profile)) => {
                        tracing::info!(
                            parallel = profile.parallel,
                            vectorized = profile.vectorized,
                            "Host capabilities detected"
                        );
                        Probed::Detected(profile)
                    }
                    Ok(Err(reason)) => {
                        tracing::warn!("Capability detection unavailable: {}", reason);
                        Probed::Unavailable(reason)
                    }
                    Err(_) => {
                        tracing::warn!(
                            "Capability detection timed out after {:?}",
                            self.timeout
                        );
                        Probed::Unavailable(format!("timed out after {:?}", self.timeout))
                    }
                }
            })
            .await
            .clone()
    }

    /// 已缓存的探测结果（尚未探测时为 None）
    pub fn cached(&self) -> Option<&Probed> {
        self.cached.get()
    }
}
