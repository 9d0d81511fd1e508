//! 预定义规划：按给定清单推进，每轮回报整张勾选后的清单

use async_trait::async_trait;

use crate::core::AgentError;
use crate::planning::prompt::{output_format, PlannerCore};
use crate::planning::{
    parse_planner_output, PlanOutcome, PlannerOutput, PlanningContext, PlanningStrategy,
    PredefinedPlannerOutput, StrategyKind, TodoList,
};

const PREDEFINED_ROLE: &str = "This task comes with a predefined checklist. \
Work through it in order: propose actions for the first unchecked item only, \
and check an item off once the history shows it was done. \
Always return the complete checklist in the TODO section. \
When every item is checked, set Task Complete to true and give the Final Answer.";

pub struct PredefinedPlanner {
    core: PlannerCore,
}

impl PredefinedPlanner {
    pub fn new(core: PlannerCore) -> Self {
        Self { core }
    }

    fn checklist_section(todo: Option<&TodoList>) -> String {
        match todo {
            Some(list) if !list.items.is_empty() => format!(
                "# Current Checklist ({}/{} done)\n{}",
                list.completed_count(),
                list.items.len(),
                list.to_markdown()
            ),
            _ => "# Current Checklist\n(empty)".to_string(),
        }
    }
}

#[async_trait]
impl PlanningStrategy for PredefinedPlanner {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Predefined
    }

    async fn plan(&self, ctx: &PlanningContext<'_>) -> Result<PlanOutcome, AgentError> {
        let reply = self
            .core
            .request(
                ctx,
                PREDEFINED_ROLE,
                &output_format(true),
                Some(Self::checklist_section(ctx.todo)),
            )
            .await?;
        let parsed = parse_planner_output(&reply.raw);
        // 模型漏掉清单时沿用上一轮的
        let todo_markdown = if parsed.todo_markdown.trim().is_empty() {
            ctx.todo.map(TodoList::to_markdown).unwrap_or_default()
        } else {
            parsed.todo_markdown
        };
        let output = PlannerOutput::Predefined(PredefinedPlannerOutput {
            reasoning: parsed.reasoning,
            todo_markdown,
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

    use crate::core::{ExecutionMetrics, Plan, PlanStep, Task};
    use crate::llm::MockLlmClient;
    use crate::memory::{ExecutionHistory, TokenBudget, TokenEstimator};

    fn planner(llm: Arc<MockLlmClient>) -> PredefinedPlanner {
        PredefinedPlanner::new(PlannerCore::new(
            llm,
            Arc::new(TokenEstimator),
            TokenBudget::default(),
            "",
        ))
    }

    fn plan() -> Plan {
        Plan::new(vec![
            PlanStep::new("open settings", ""),
            PlanStep::new("enable dark mode", ""),
        ])
    }

    #[tokio::test]
    async fn test_predefined_plan_sends_checklist_and_parses_todo() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "## Reasoning\nSettings are open.\n## TODO\n- [x] open settings\n- [ ] enable dark mode\n## Proposed Actions\nclick the dark mode toggle\n## Task Complete\nfalse",
        ]));
        let p = planner(llm.clone());
        let task = Task::with_plan("dark mode", plan());
        let todo = TodoList::from_plan(&plan());
        let history = ExecutionHistory::new();
        let metrics = ExecutionMetrics::new();
        let token = CancellationToken::new();
        let ctx = PlanningContext {
            task: &task,
            history: &history,
            metrics: &metrics,
            todo: Some(&todo),
            retry_hint: None,
            force_summary: false,
            cancel_token: &token,
        };
        let outcome = p.plan(&ctx).await.unwrap();
        let markdown = outcome.output.todo_markdown().unwrap();
        let list = TodoList::parse_markdown(markdown).unwrap();
        assert_eq!(list.completed_count(), 1);

        let sent = &llm.requests()[0][1].content;
        assert!(sent.contains("# Current Checklist (0/2 done)"));
        assert!(sent.contains("- [ ] enable dark mode"));
    }

    #[tokio::test]
    async fn test_missing_todo_keeps_previous_checklist() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "## Reasoning\nhmm\n## Proposed Actions\nclick settings",
        ]));
        let p = planner(llm);
        let task = Task::with_plan("dark mode", plan());
        let todo = TodoList::from_plan(&plan());
        let history = ExecutionHistory::new();
        let metrics = ExecutionMetrics::new();
        let token = CancellationToken::new();
        let ctx = PlanningContext {
            task: &task,
            history: &history,
            metrics: &metrics,
            todo: Some(&todo),
            retry_hint: None,
            force_summary: false,
            cancel_token: &token,
        };
        let outcome = p.plan(&ctx).await.unwrap();
        assert_eq!(outcome.output.todo_markdown().unwrap(), todo.to_markdown());
    }
}
