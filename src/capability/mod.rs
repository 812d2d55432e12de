//! 宿主能力探测：并行执行与向量指令支持
//!
//! 探测在 Worker 生命周期内至多执行一次，结果缓存；探测本身失败不会让 Worker 崩溃。

mod probe;

pub use probe::{
    CapabilityDetector, CapabilityProbe, CapabilityProfile, HostDetector, Probed, StaticDetector,
};
