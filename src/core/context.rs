//! 单次运行的执行上下文
//!
//! 在 `execute()` 入口构造，按引用传给每个调用，运行结束即丢弃，从不跨运行复用。
//! 执行历史、指标与 TODO 清单只由 Orchestrator 在两次 await 之间修改。

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::{AgentError, ExecutionMetrics, RunPhase, Task};
use crate::memory::ExecutionHistory;
use crate::planning::{StrategyKind, TodoList};

/// Planner 每次尝试留下的推理记录（仅供观测，不参与控制流）
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRecord {
    pub iteration: u32,
    pub attempt: u32,
    pub reasoning: String,
    /// LLM 原始回复，解析失败时用于排查
    pub raw: String,
}

#[derive(Debug)]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub task: Task,
    pub strategy: StrategyKind,
    pub metrics: ExecutionMetrics,
    pub history: ExecutionHistory,
    /// 预定义模式下的权威清单状态
    pub todo: Option<TodoList>,
    pub reasoning_log: Vec<ReasoningRecord>,
    pub iteration: u32,
    phase: RunPhase,
    cancel_token: CancellationToken,
}

impl ExecutionContext {
    pub fn new(task: Task, strategy: StrategyKind, cancel_token: CancellationToken) -> Self {
        let todo = match strategy {
            StrategyKind::Predefined => task.predefined_plan().map(TodoList::from_plan),
            StrategyKind::Dynamic => None,
        };
        Self {
            run_id: Uuid::new_v4(),
            task,
            strategy,
            metrics: ExecutionMetrics::new(),
            history: ExecutionHistory::new(),
            todo,
            reasoning_log: Vec::new(),
            iteration: 0,
            phase: RunPhase::Initializing,
            cancel_token,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn set_phase(&mut self, next: RunPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(from = ?self.phase, to = ?next, "unexpected phase transition");
        }
        self.phase = next;
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    pub fn ensure_not_cancelled(&self) -> Result<(), AgentError> {
        if self.cancel_token.is_cancelled() {
            Err(AgentError::Cancelled)
        } else {
            Ok(())
        }
    }
}
