//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CRAFT_WORKER__*` 覆盖（双下划线表示嵌套，如 `CRAFT_WORKER__SOLVER__GENERATIONS=500`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default)]
    pub solver: SolverSection,
    #[serde(default)]
    pub backend: BackendSection,
}

/// [worker] 段：能力探测超时、名人堂容量、执行日志上限
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSection {
    /// 能力探测超时（毫秒），超时视为「探测不可用」
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_hall_of_fame_size")]
    pub hall_of_fame_size: usize,
    /// 单个会话执行日志的最大字节数，超出时丢弃最早的行
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: usize,
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_hall_of_fame_size() -> usize {
    10
}

fn default_max_log_bytes() -> usize {
    1024 * 1024
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            hall_of_fame_size: default_hall_of_fame_size(),
            max_log_bytes: default_max_log_bytes(),
        }
    }
}

/// [solver] 段：代数预算
#[derive(Debug, Clone, Deserialize)]
pub struct SolverSection {
    /// 新会话的初始 maxGeneration
    #[serde(default = "default_generations")]
    pub generations: u64,
    /// Resume 时 maxGeneration 的增量；未设置时与 generations 相同
    pub resume_increment: Option<u64>,
}

fn default_generations() -> u64 {
    1000
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            generations: default_generations(),
            resume_increment: None,
        }
    }
}

impl SolverSection {
    pub fn increment(&self) -> u64 {
        self.resume_increment.unwrap_or(self.generations)
    }
}

/// [backend] 段：强制后端与线程池大小
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendSection {
    /// vectorized-parallel / parallel / scalar；设置后跳过能力探测
    pub force: Option<String>,
    /// 并行后端线程池大小，未设置时取硬件并发数
    pub threads: Option<usize>,
}

/// 从 config 目录加载配置，环境变量 CRAFT_WORKER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CRAFT_WORKER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CRAFT_WORKER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
