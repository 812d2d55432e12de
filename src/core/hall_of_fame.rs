//! 名人堂：会话内观察到的最优候选，按分数从高到低排列
//!
//! 榜首只会被「不差于它」的候选替换，因此榜首分数在会话内单调不减。

use serde::Serialize;

use crate::protocol::Action;

/// 候选解：动作序列 + 分数（越高越好）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub action_sequence: Vec<Action>,
    pub score: f64,
}

impl Candidate {
    pub fn new(action_sequence: Vec<Action>, score: f64) -> Self {
        Self {
            action_sequence,
            score,
        }
    }
}

/// 有容量上限的最优候选记录
#[derive(Debug, Clone)]
pub struct HallOfFame {
    capacity: usize,
    entries: Vec<Candidate>,
}

impl HallOfFame {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// 记录候选；返回它是否成为新的榜首
    ///
    /// NaN 分数无法排序，直接丢弃。相同动作序列只保留分数较高的一条。
    pub fn record(&mut self, candidate: Candidate) -> bool {
        if candidate.score.is_nan() {
            return false;
        }

        if let Some(existing) = self
            .entries
            .iter()
            .position(|c| c.action_sequence == candidate.action_sequence)
        {
            if self.entries[existing].score >= candidate.score {
                return false;
            }
            self.entries.remove(existing);
        }

        // 同分时新候选排在前面（「不差于」即可替换）
        let index = self
            .entries
            .iter()
            .position(|c| c.score <= candidate.score)
            .unwrap_or(self.entries.len());
        if index >= self.capacity {
            return false;
        }

        self.entries.insert(index, candidate);
        self.entries.truncate(self.capacity);
        index == 0
    }

    pub fn top(&self) -> Option<&Candidate> {
        self.entries.first()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.top().map(|c| c.score)
    }

    pub fn entries(&self) -> &[Candidate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
