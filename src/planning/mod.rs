//! 规划层：两种策略（动态 / 预定义清单）、输出解析、TODO 清单与 prompt 构建
//!
//! Orchestrator 在运行开始时选定一个 `PlanningStrategy`，之后每轮只调用 `plan`。

pub mod dynamic;
pub mod parser;
pub mod predefined;
pub mod prompt;
pub mod todo;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, ExecutionMetrics, Task};
use crate::memory::{ExecutionHistory, Summary};

pub use dynamic::DynamicPlanner;
pub use parser::{parse_planner_output, render_sections, ParsedPlan};
pub use predefined::PredefinedPlanner;
pub use prompt::PlannerCore;
pub use todo::{TodoItem, TodoList};

/// 规划策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Dynamic,
    Predefined,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Dynamic => "dynamic",
            StrategyKind::Predefined => "predefined",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicPlannerOutput {
    pub reasoning: String,
    pub proposed_actions: String,
    pub task_complete: bool,
    pub final_answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefinedPlannerOutput {
    pub reasoning: String,
    pub todo_markdown: String,
    pub proposed_actions: String,
    pub task_complete: bool,
    pub final_answer: String,
}

/// 单轮规划输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PlannerOutput {
    Dynamic(DynamicPlannerOutput),
    Predefined(PredefinedPlannerOutput),
}

impl PlannerOutput {
    pub fn reasoning(&self) -> &str {
        match self {
            PlannerOutput::Dynamic(o) => &o.reasoning,
            PlannerOutput::Predefined(o) => &o.reasoning,
        }
    }

    pub fn proposed_actions(&self) -> &str {
        match self {
            PlannerOutput::Dynamic(o) => &o.proposed_actions,
            PlannerOutput::Predefined(o) => &o.proposed_actions,
        }
    }

    pub fn task_complete(&self) -> bool {
        match self {
            PlannerOutput::Dynamic(o) => o.task_complete,
            PlannerOutput::Predefined(o) => o.task_complete,
        }
    }

    pub fn final_answer(&self) -> &str {
        match self {
            PlannerOutput::Dynamic(o) => &o.final_answer,
            PlannerOutput::Predefined(o) => &o.final_answer,
        }
    }

    pub fn todo_markdown(&self) -> Option<&str> {
        match self {
            PlannerOutput::Dynamic(_) => None,
            PlannerOutput::Predefined(o) => Some(&o.todo_markdown),
        }
    }

    /// 「未完成且没有任何动作」视为不可用输出，需要在本轮重试
    ///
    /// `todo` 为本次回复生效的清单；清单全部勾选且有最终回答时算作完成，不需要动作。
    pub fn validate(&self, todo: Option<&TodoList>) -> Result<(), AgentError> {
        if !self.is_complete(todo) && self.proposed_actions().trim().is_empty() {
            return Err(AgentError::PlanParse(
                "no proposed actions while the task is not complete".to_string(),
            ));
        }
        Ok(())
    }

    /// 显式完成，或（预定义模式）清单全部勾选且给出了最终回答
    pub fn is_complete(&self, todo: Option<&TodoList>) -> bool {
        if self.task_complete() {
            return true;
        }
        matches!(self, PlannerOutput::Predefined(_))
            && todo.map(TodoList::all_done).unwrap_or(false)
            && !self.final_answer().trim().is_empty()
    }

    pub fn to_parsed(&self) -> ParsedPlan {
        ParsedPlan {
            reasoning: self.reasoning().to_string(),
            proposed_actions: self.proposed_actions().to_string(),
            todo_markdown: self.todo_markdown().unwrap_or_default().to_string(),
            task_complete: self.task_complete(),
            final_answer: self.final_answer().to_string(),
        }
    }

    /// 写入执行历史 / prompt 的分段文本
    pub fn to_prompt_text(&self) -> String {
        render_sections(&self.to_parsed(), self.todo_markdown().is_some())
    }
}

/// 单次 `plan` 调用的只读输入
pub struct PlanningContext<'a> {
    pub task: &'a Task,
    pub history: &'a ExecutionHistory,
    pub metrics: &'a ExecutionMetrics,
    pub todo: Option<&'a TodoList>,
    /// 上次尝试失败时 RecoveryEngine 给出的纠正提示
    pub retry_hint: Option<&'a str>,
    /// 上下文超限后强制压缩历史
    pub force_summary: bool,
    pub cancel_token: &'a CancellationToken,
}

/// `plan` 的结果：输出、LLM 原始回复，以及本次触发的历史摘要（由 Orchestrator 替换历史）
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub output: PlannerOutput,
    pub raw: String,
    pub summary: Option<Summary>,
}

#[async_trait]
pub trait PlanningStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn plan(&self, ctx: &PlanningContext<'_>) -> Result<PlanOutcome, AgentError>;
}
