//! 错误恢复引擎
//!
//! 根据规划阶段的 AgentError 返回 RecoveryAction，供 Orchestrator 决定是带提示重试、压缩历史后重试，还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::PlanParse(detail) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous reply could not be used ({detail}). \
                Reply again using exactly these sections: \
                `## Reasoning`, `## Proposed Actions` (one action per line), \
                `## Task Complete` (true or false) and `## Final Answer`. \
                If the task is not complete you must propose at least one action."
            )),
            AgentError::ContextWindowExceeded => RecoveryAction::SummarizeAndPrune,
            _ => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_recovery_parse_error() {
        let engine = RecoveryEngine::new();
        let err = AgentError::PlanParse("no proposed actions".to_string());
        match engine.handle(&err) {
            RecoveryAction::RetryWithPrompt(msg) => {
                assert!(msg.contains("no proposed actions"));
                assert!(msg.contains("## Proposed Actions"));
            }
            other => panic!("Expected RetryWithPrompt, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_context_exceeded() {
        let engine = RecoveryEngine::new();
        let action = engine.handle(&AgentError::ContextWindowExceeded);
        assert!(matches!(action, RecoveryAction::SummarizeAndPrune));
    }

    #[test]
    fn test_recovery_llm_error_aborts() {
        let engine = RecoveryEngine::new();
        let err = AgentError::LlmError(LlmError::RateLimited { retry_after_ms: 1000 });
        assert!(matches!(engine.handle(&err), RecoveryAction::Abort));
    }

    #[test]
    fn test_recovery_cancelled_aborts() {
        let engine = RecoveryEngine::new();
        assert!(matches!(engine.handle(&AgentError::Cancelled), RecoveryAction::Abort));
        assert!(matches!(engine.handle(&AgentError::HumanAbort), RecoveryAction::Abort));
    }
}
