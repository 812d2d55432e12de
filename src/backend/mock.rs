//! Mock 求解器（用于测试与演示，无需真实求解模块）
//!
//! 每代按固定种子生成一批随机动作序列，按会话创建时抽取的权重表打分，并做精英保留：
//! 同样的输入在任何后端变体上得到同样的结果。并行变体用 rayon 并行评估。

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde_json::{json, Value};

use super::traits::{ExecutionContext, GenerationOutcome, Solver, SolverEngine};
use crate::core::Candidate;
use crate::protocol::{Action, ProblemInput};

const DEFAULT_ACTIONS: [&str; 6] = [
    "basicSynth",
    "basicTouch",
    "mastersMend",
    "innovation",
    "veneration",
    "observe",
];

/// 单代评估的种群上限，避免 Mock 变成真正的负载
const MAX_SAMPLES: u32 = 256;

/// Mock 求解器工厂
#[derive(Debug, Clone)]
pub struct MockSolverEngine {
    seed: u64,
    step_delay: Option<Duration>,
}

impl MockSolverEngine {
    pub fn new() -> Self {
        Self {
            seed: 0x5EED_CAFE,
            step_delay: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// 每代额外耗时（模拟重计算）
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }
}

impl Default for MockSolverEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 从输入的 crafter.actions 取可用动作，没有时用默认集合
fn available_actions(input: &ProblemInput) -> Vec<Action> {
    let from_input: Vec<Action> = input
        .definition
        .get("crafter")
        .and_then(|c| c.get("actions"))
        .and_then(Value::as_array)
        .map(|actions| {
            actions
                .iter()
                .filter_map(Value::as_str)
                .map(Action::from)
                .collect()
        })
        .unwrap_or_default();

    if from_input.is_empty() {
        DEFAULT_ACTIONS.iter().map(|a| Action::from(*a)).collect()
    } else {
        from_input
    }
}

impl SolverEngine for MockSolverEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(
        &self,
        input: &ProblemInput,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn Solver>, String> {
        input.validate()?;
        let actions = available_actions(input);
        let max_length = input.max_length as usize;

        // weights[position][action]
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let weights: Vec<Vec<u32>> = (0..max_length)
            .map(|_| {
                (0..actions.len())
                    .map(|_| rng.random_range(0..100u32))
                    .collect()
            })
            .collect();

        Ok(Box::new(MockSolver {
            actions,
            weights,
            max_length,
            samples: input.population_size.min(MAX_SAMPLES),
            seed: self.seed,
            step_delay: self.step_delay,
            ctx: *ctx,
            generation: 0,
            best: None,
        }))
    }
}

struct MockSolver {
    actions: Vec<Action>,
    weights: Vec<Vec<u32>>,
    max_length: usize,
    samples: u32,
    seed: u64,
    step_delay: Option<Duration>,
    ctx: ExecutionContext,
    generation: u64,
    best: Option<Candidate>,
}

impl MockSolver {
    /// 第 index 个样本：长度 1..=max_length，分数为各位置权重之和
    fn sample(&self, index: u32) -> Candidate {
        let mut rng =
            SmallRng::seed_from_u64(self.seed ^ (self.generation << 20) ^ u64::from(index));
        let length = rng.random_range(1..=self.max_length);
        let mut sequence = Vec::with_capacity(length);
        let mut score = 0.0;
        for position in 0..length {
            let choice = rng.random_range(0..self.actions.len());
            score += f64::from(self.weights[position][choice]);
            sequence.push(self.actions[choice].clone());
        }
        Candidate::new(sequence, score)
    }

    fn best_of_generation(&self) -> Option<Candidate> {
        if self.ctx.parallel() {
            (0..self.samples)
                .into_par_iter()
                .map(|i| self.sample(i))
                .max_by(|a, b| a.score.total_cmp(&b.score))
        } else {
            (0..self.samples)
                .map(|i| self.sample(i))
                .max_by(|a, b| a.score.total_cmp(&b.score))
        }
    }
}

impl Solver for MockSolver {
    fn step(&mut self) -> Result<GenerationOutcome, String> {
        if let Some(delay) = self.step_delay {
            std::thread::sleep(delay);
        }
        self.generation += 1;

        let generation_best = self.best_of_generation();
        let generation_score = generation_best.as_ref().map(|c| c.score);
        if let Some(candidate) = generation_best {
            let better = self
                .best
                .as_ref()
                .map_or(true, |best| candidate.score > best.score);
            if better {
                self.best = Some(candidate);
            }
        }

        let threads = if self.ctx.parallel() {
            rayon::current_num_threads()
        } else {
            1
        };
        Ok(GenerationOutcome {
            metrics: json!({
                "generation": self.generation,
                "samples": self.samples,
                "threads": threads,
                "generationBestScore": generation_score,
            }),
            best: self.best.clone(),
        })
    }

    fn finalize(&mut self) -> Result<GenerationOutcome, String> {
        Ok(GenerationOutcome {
            metrics: json!({ "generation": self.generation, "final": true }),
            best: self.best.clone(),
        })
    }
}
