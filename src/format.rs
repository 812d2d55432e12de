//! 动作序列 -> 简短名称（仅用于最终的 FinishReport）

use std::collections::HashMap;

use crate::protocol::Action;

/// 动作名格式化
pub trait ActionFormatter: Send + Sync {
    fn short_names(&self, actions: &[Action]) -> Vec<String>;
}

/// 默认格式化：动作名本身就是简称（如 `basicSynth`），可按需登记别名
#[derive(Debug, Clone, Default)]
pub struct ShortNameFormatter {
    aliases: HashMap<String, String>,
}

impl ShortNameFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, action: impl Into<String>, short: impl Into<String>) -> Self {
        self.aliases.insert(action.into(), short.into());
        self
    }
}

impl ActionFormatter for ShortNameFormatter {
    fn short_names(&self, actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .map(|a| {
                self.aliases
                    .get(a.name())
                    .cloned()
                    .unwrap_or_else(|| a.name().to_string())
            })
            .collect()
    }
}
