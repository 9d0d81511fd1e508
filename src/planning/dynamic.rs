//! 动态规划：每轮根据历史与当前状态自由决定下一步

use async_trait::async_trait;

use crate::core::AgentError;
use crate::planning::prompt::{output_format, PlannerCore};
use crate::planning::{
    parse_planner_output, DynamicPlannerOutput, PlanOutcome, PlannerOutput, PlanningContext,
    PlanningStrategy, StrategyKind,
};

const DYNAMIC_ROLE: &str = "There is no fixed plan for this task. \
Work out the best next actions from the task description and what has happened so far.";

pub struct DynamicPlanner {
    core: PlannerCore,
}

impl DynamicPlanner {
    pub fn new(core: PlannerCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl PlanningStrategy for DynamicPlanner {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dynamic
    }

    async fn plan(&self, ctx: &PlanningContext<'_>) -> Result<PlanOutcome, AgentError> {
        let reply = self
            .core
            .request(ctx, DYNAMIC_ROLE, &output_format(false), None)
            .await?;
        let parsed = parse_planner_output(&reply.raw);
        let output = PlannerOutput::Dynamic(DynamicPlannerOutput {
            reasoning: parsed.reasoning,
            proposed_actions: parsed.proposed_actions,
            task_complete: parsed.task_complete,
            final_answer: parsed.final_answer,
        });
        Ok(PlanOutcome {
            output,
            raw: reply.raw,
            summary: reply.summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    use crate::core::{ExecutionMetrics, Task};
    use crate::llm::MockLlmClient;
    use crate::memory::{ExecutionHistory, TokenBudget, TokenEstimator};

    #[tokio::test]
    async fn test_dynamic_plan_parses_sections() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "## Reasoning\nThe search box is empty.\n\n## Proposed Actions\n1. type \"rust\"\n2. press enter\n\n## Task Complete\nfalse",
        ]));
        let planner = DynamicPlanner::new(PlannerCore::new(
            llm,
            Arc::new(TokenEstimator),
            TokenBudget::default(),
            "",
        ));
        let task = Task::new("search for rust");
        let history = ExecutionHistory::new();
        let metrics = ExecutionMetrics::new();
        let token = CancellationToken::new();
        let ctx = PlanningContext {
            task: &task,
            history: &history,
            metrics: &metrics,
            todo: None,
            retry_hint: None,
            force_summary: false,
            cancel_token: &token,
        };
        let outcome = planner.plan(&ctx).await.unwrap();
        assert_eq!(outcome.output.reasoning(), "The search box is empty.");
        assert!(outcome.output.proposed_actions().contains("press enter"));
        assert!(!outcome.output.task_complete());
        assert!(outcome.output.todo_markdown().is_none());
        assert!(outcome.summary.is_none());
    }
}
