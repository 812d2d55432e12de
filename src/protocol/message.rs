//! 消息协议定义
//!
//! 所有数据以序列化副本跨越边界，控制端与 Worker 不共享内存。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 单个动作（如 `basicSynth`），对 Worker 来说是不透明的名字
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(pub String);

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 会话级求解参数（对应输入里的 `solver` 段）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverSettings {
    /// 覆盖配置中的代数预算与 Resume 增量
    #[serde(default)]
    pub generations: Option<u64>,
    /// 其余字段原样交给求解器
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Start 携带的问题定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInput {
    pub max_length: u32,
    pub population_size: u32,
    #[serde(default)]
    pub solver: Option<SolverSettings>,
    /// 制作/模拟定义（crafter、recipe 等），Worker 不解析
    #[serde(flatten)]
    pub definition: Map<String, Value>,
}

impl ProblemInput {
    pub fn new(max_length: u32, population_size: u32) -> Self {
        Self {
            max_length,
            population_size,
            solver: None,
            definition: Map::new(),
        }
    }

    pub fn with_generations(mut self, generations: u64) -> Self {
        self.solver.get_or_insert_with(SolverSettings::default).generations = Some(generations);
        self
    }

    pub fn with_definition(mut self, key: &str, value: Value) -> Self {
        self.definition.insert(key.to_string(), value);
        self
    }

    /// 输入中指定的代数预算（若有）
    pub fn generations(&self) -> Option<u64> {
        self.solver.as_ref().and_then(|s| s.generations)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_length == 0 {
            return Err("maxLength must be greater than zero".to_string());
        }
        if self.population_size == 0 {
            return Err("populationSize must be greater than zero".to_string());
        }
        if self.generations() == Some(0) {
            return Err("solver.generations must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// 入站消息（控制端 -> Worker）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inbound {
    /// 创建（或替换）会话并推进第一代
    Start(ProblemInput),
    /// 预算耗尽时追加一轮预算，然后推进一代
    Resume,
    /// 推进恰好一代
    #[serde(rename = "rungen")]
    RunGeneration,
    /// 收尾并返回最终结果
    Finish,
}

impl Inbound {
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::Start(_) => "start",
            Inbound::Resume => "resume",
            Inbound::RunGeneration => "rungen",
            Inbound::Finish => "finish",
        }
    }
}

/// 每代进度
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub generations_completed: u64,
    pub max_generations: u64,
    /// 名人堂榜首分数；还没有候选时为空
    pub best_score: Option<f64>,
    pub best_sequence: Vec<Action>,
    /// 本次步进是否刷新了最优
    pub improved: bool,
    /// 预算已耗尽，本次没有执行步进
    pub exhausted: bool,
    /// 后端自定义的进度数据
    #[serde(default)]
    pub metrics: Value,
    /// 只出现在 Start 之后的第一份报告里，例如 Scalar 回退导致的性能下降
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Finish 的最终结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishReport {
    pub execution_log: String,
    /// 毫秒
    pub elapsed_time: u64,
    pub best_sequence: Vec<String>,
}

/// 错误报告；没有会话时不带日志
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_log: Option<String>,
}

/// 出站消息（Worker -> 控制端）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outbound {
    Progress(StepReport),
    Success(FinishReport),
    Error(ErrorReport),
}

impl Outbound {
    pub fn error(error: impl Into<String>, execution_log: Option<String>) -> Self {
        Outbound::Error(ErrorReport {
            error: error.into(),
            execution_log,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outbound::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_commands() {
        let resume: Inbound = serde_json::from_str(r#""resume""#).unwrap();
        assert!(matches!(resume, Inbound::Resume));
        let rungen: Inbound = serde_json::from_str(r#""rungen""#).unwrap();
        assert!(matches!(rungen, Inbound::RunGeneration));
        let finish: Inbound = serde_json::from_str(r#""finish""#).unwrap();
        assert!(matches!(finish, Inbound::Finish));
        assert!(serde_json::from_str::<Inbound>(r#""pause""#).is_err());
    }

    #[test]
    fn test_parse_start_keeps_definition() {
        let raw = json!({
            "start": {
                "crafter": {"level": 90, "actions": ["basicSynth", "basicTouch"]},
                "recipe": {"difficulty": 3500},
                "maxLength": 20,
                "populationSize": 50,
                "solver": {"generations": 300, "penaltyWeight": 10000}
            }
        });
        let msg: Inbound = serde_json::from_value(raw).unwrap();
        let Inbound::Start(input) = msg else {
            panic!("Expected Start");
        };
        assert_eq!(input.max_length, 20);
        assert_eq!(input.population_size, 50);
        assert_eq!(input.generations(), Some(300));
        assert!(input.definition.contains_key("crafter"));
        assert!(input.definition.contains_key("recipe"));
        assert_eq!(
            input.solver.unwrap().extra.get("penaltyWeight"),
            Some(&json!(10000))
        );
    }

    #[test]
    fn test_validate_rejects_empty_budgets() {
        assert!(ProblemInput::new(20, 50).validate().is_ok());
        assert!(ProblemInput::new(0, 50).validate().is_err());
        assert!(ProblemInput::new(20, 0).validate().is_err());
        assert!(ProblemInput::new(20, 50).with_generations(0).validate().is_err());
    }

    #[test]
    fn test_outbound_shapes() {
        let success = Outbound::Success(FinishReport {
            execution_log: "log".into(),
            elapsed_time: 12,
            best_sequence: vec!["basicSynth".into()],
        });
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            json!({"success": {"executionLog": "log", "elapsedTime": 12, "bestSequence": ["basicSynth"]}})
        );

        let error = Outbound::error("boom", None);
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"error": {"error": "boom"}})
        );
    }

    #[test]
    fn test_step_report_is_camel_case() {
        let report = Outbound::Progress(StepReport {
            generations_completed: 3,
            max_generations: 10,
            best_score: Some(42.0),
            best_sequence: vec![Action::from("basicTouch")],
            improved: true,
            exhausted: false,
            metrics: json!({"population": 50}),
            warning: None,
        });
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["progress"]["generationsCompleted"], json!(3));
        assert_eq!(value["progress"]["bestSequence"], json!(["basicTouch"]));
        assert!(value["progress"].get("warning").is_none());
    }
}
