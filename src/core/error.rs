//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：规划阶段的错误在单轮重试预算内被吸收（RetryWithPrompt / SummarizeAndPrune），
//! 其余错误或预算耗尽后转成单个类型化错误，从 `Orchestrator::execute` 抛出。

use thiserror::Error;

use crate::core::RunPhase;
use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// Planner 输出缺少必需字段（单次，可重试）
    #[error("Plan parse failure: {0}")]
    PlanParse(String),

    /// 单轮内连续 attempts 次规划都不可用
    #[error("Planning failed after {attempts} attempts: {last_error}")]
    PlanningFailed { attempts: u32, last_error: String },

    #[error("Max iterations reached ({ceiling}) in {mode} mode without completion")]
    IterationBudgetExceeded { mode: String, ceiling: u32 },

    #[error("Context window exceeded")]
    ContextWindowExceeded,

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("LLM error: {0}")]
    LlmError(LlmError),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 运行被取消（用户 Stop / 进程关闭）
    #[error("Task cancelled")]
    Cancelled,

    /// 人工介入时用户选择终止
    #[error("Task aborted by user during human input")]
    HumanAbort,
}

impl AgentError {
    /// 是否是主动停止（取消 / 人工终止），调用方据此区分「故意停止」与「故障」
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            AgentError::Cancelled | AgentError::HumanAbort | AgentError::LlmError(LlmError::Cancelled)
        )
    }

    /// 以该错误结束的运行所处的终止阶段
    pub fn terminal_phase(&self) -> RunPhase {
        if self.is_cancellation() {
            RunPhase::Aborted
        } else {
            RunPhase::Failed
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Cancelled => AgentError::Cancelled,
            LlmError::ContextWindowExceeded => AgentError::ContextWindowExceeded,
            other => AgentError::LlmError(other),
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一次尝试，让 LLM 重试（如输出格式错误）
    RetryWithPrompt(String),
    /// 压缩执行历史后重试（如超长上下文）
    SummarizeAndPrune,
    /// 终止当前任务
    Abort,
}
