//! Planner 的共用部分：system prompt 拼装、token 阈值检查与历史摘要、LLM 调用
//!
//! 两种策略只在「角色说明」和「输出格式」上不同，其余都走 `PlannerCore`。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{CompletionOptions, LlmClient, Message};
use crate::memory::{
    ExecutionHistoryEntry, HistorySummarizer, Summary, TokenBudget, TokenCounter,
};
use crate::planning::parser::{
    SECTION_ACTIONS, SECTION_COMPLETE, SECTION_FINAL, SECTION_REASONING, SECTION_TODO,
};
use crate::planning::PlanningContext;

const BASE_ROLE: &str = "You are the planner of an autonomous browser agent. \
Each turn you look at the task, what has been done so far and the current state, \
then decide the next concrete actions. An executor carries out your proposed actions with the tools listed below; \
you never call tools yourself.";

const RULES: &str = "## Rules
- Propose only actions that move the task forward from the current state.
- Be concrete: name the element, link text or value to use.
- If earlier actions failed, say why in your reasoning and try something different.
- Set Task Complete to true only when the task is finished, and give the result in Final Answer.";

/// 本次规划请求：LLM 原始回复，以及（若触发）新的历史摘要
#[derive(Debug, Clone)]
pub struct PlannerReply {
    pub raw: String,
    pub summary: Option<Summary>,
}

pub struct PlannerCore {
    llm: Arc<dyn LlmClient>,
    counter: Arc<dyn TokenCounter>,
    budget: TokenBudget,
    summarizer: HistorySummarizer,
    tool_catalog: String,
    retries: u32,
}

impl PlannerCore {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        counter: Arc<dyn TokenCounter>,
        budget: TokenBudget,
        tool_catalog: impl Into<String>,
    ) -> Self {
        let summarizer = HistorySummarizer::new(llm.clone(), counter.clone(), &budget);
        Self {
            llm,
            counter,
            budget,
            summarizer,
            tool_catalog: tool_catalog.into(),
            retries: 0,
        }
    }

    /// 单次 LLM 调用内部的传输层重试次数（与 Orchestrator 的输出重试无关）
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// 拼装 system prompt：角色、输出格式、工具目录、执行指标
    pub fn system_prompt(&self, ctx: &PlanningContext<'_>, role: &str, format: &str) -> String {
        let tools = if self.tool_catalog.trim().is_empty() {
            "(no tools registered)".to_string()
        } else {
            self.tool_catalog.clone()
        };
        format!(
            "{BASE_ROLE}\n\n{role}\n\n{RULES}\n\n{format}\n\n## Available Tools\n{tools}\n\n{}",
            ctx.metrics.to_prompt_section()
        )
    }

    /// 历史的 prompt 文本；越过阈值（或被要求强制压缩）时先做摘要
    async fn history_text(
        &self,
        ctx: &PlanningContext<'_>,
        system: &str,
        options: &CompletionOptions,
    ) -> Result<(String, Option<Summary>), AgentError> {
        let text = ctx.history.to_prompt_text();
        if ctx.history.is_empty() {
            return Ok((text, None));
        }
        let system_tokens = self.counter.count(system);
        let history_tokens = self.counter.count(&text);
        if !ctx.force_summary && !self.budget.should_summarize(system_tokens, history_tokens) {
            return Ok((text, None));
        }

        tracing::info!(
            system_tokens,
            history_tokens,
            threshold = self.budget.threshold(),
            forced = ctx.force_summary,
            "history over token budget, summarizing"
        );
        let task = ctx.task.text();
        match self.summarizer.summarize(task, ctx.history, options).await {
            Ok(summary) => {
                let text = ExecutionHistoryEntry::summary(summary.clone()).to_prompt_text();
                Ok((text, Some(summary)))
            }
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                // 摘要失败不终止运行，本轮带着完整历史继续
                tracing::warn!(error = %e, "history summarization failed, keeping full history");
                Ok((text, None))
            }
        }
    }

    /// 组装消息并调用 LLM
    pub async fn request(
        &self,
        ctx: &PlanningContext<'_>,
        role: &str,
        format: &str,
        extra: Option<String>,
    ) -> Result<PlannerReply, AgentError> {
        let options =
            CompletionOptions::new(self.retries).with_cancel_token(ctx.cancel_token.clone());
        let system = self.system_prompt(ctx, role, format);
        let (history, summary) = self.history_text(ctx, &system, &options).await?;

        let mut user = format!("# Task\n{}\n\n# Execution History\n", ctx.task.text());
        if history.trim().is_empty() {
            user.push_str("(nothing has been done yet)\n");
        } else {
            user.push_str(&history);
            user.push('\n');
        }
        if let Some(extra) = extra {
            user.push_str(&format!("\n{extra}\n"));
        }
        if let Some(hint) = ctx.retry_hint {
            user.push_str(&format!("\n# Correction\n{hint}\n"));
        }

        let messages = vec![Message::system(system), Message::user(user)];
        tracing::debug!(
            tokens = self.counter.count_messages(&messages),
            "planner request"
        );
        let response = self.llm.complete(&messages, &options).await?;
        Ok(PlannerReply {
            raw: response.content,
            summary,
        })
    }
}

/// 分段输出格式说明；`with_todo` 为预定义模式
pub fn output_format(with_todo: bool) -> String {
    let mut s = format!(
        "## Output Format\nReply with these markdown sections, in this order:\n\n## {SECTION_REASONING}\nWhat you see and why you choose the next actions.\n\n"
    );
    if with_todo {
        s.push_str(&format!(
            "## {SECTION_TODO}\nThe full checklist, one `- [ ]` / `- [x]` item per line, with finished items checked.\n\n"
        ));
    }
    s.push_str(&format!(
        "## {SECTION_ACTIONS}\nNumbered list of the next actions for the executor. Leave empty only when the task is complete.\n\n## {SECTION_COMPLETE}\ntrue or false\n\n## {SECTION_FINAL}\nThe result for the user, only when the task is complete."
    ));
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    use crate::core::{ExecutionMetrics, Task};
    use crate::llm::MockLlmClient;
    use crate::memory::{ExecutionHistory, TokenEstimator};
    use crate::planning::{DynamicPlannerOutput, PlannerOutput};

    fn history(n: u32, padding: usize) -> ExecutionHistory {
        let mut h = ExecutionHistory::new();
        for i in 1..=n {
            h.push(ExecutionHistoryEntry::plan(
                PlannerOutput::Dynamic(DynamicPlannerOutput {
                    reasoning: format!("iteration {i} {}", "x ".repeat(padding)),
                    proposed_actions: format!("scroll down {i}"),
                    task_complete: false,
                    final_answer: String::new(),
                }),
                vec![],
                i,
            ));
        }
        h
    }

    fn planner_core(llm: Arc<MockLlmClient>, max_tokens: usize) -> PlannerCore {
        PlannerCore::new(
            llm,
            Arc::new(TokenEstimator),
            TokenBudget::new(max_tokens),
            "- echo: Echo text back",
        )
    }

    #[tokio::test]
    async fn test_request_without_summary_under_threshold() {
        let llm = Arc::new(MockLlmClient::with_responses(["## Reasoning\nok"]));
        let planner = planner_core(llm.clone(), 128_000);
        let task = Task::new("open the page");
        let h = history(2, 5);
        let metrics = ExecutionMetrics::new();
        let token = CancellationToken::new();
        let ctx = PlanningContext {
            task: &task,
            history: &h,
            metrics: &metrics,
            todo: None,
            retry_hint: Some("use the section format"),
            force_summary: false,
            cancel_token: &token,
        };
        let reply = planner.request(&ctx, "role", &output_format(false), None).await.unwrap();
        assert!(reply.summary.is_none());
        assert_eq!(llm.call_count(), 1);

        let sent = &llm.requests()[0];
        assert!(sent[0].content.contains("## Available Tools\n- echo"));
        assert!(sent[1].content.contains("scroll down 2"));
        assert!(sent[1].content.contains("# Correction\nuse the section format"));
    }

    #[tokio::test]
    async fn test_request_summarizes_over_threshold() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "## Summary\nScrolled three times.",
            "## Reasoning\nnext",
        ]));
        let planner = planner_core(llm.clone(), 2_000);
        let task = Task::new("find the footer");
        let h = history(3, 1_000);
        let metrics = ExecutionMetrics::new();
        let token = CancellationToken::new();
        let ctx = PlanningContext {
            task: &task,
            history: &h,
            metrics: &metrics,
            todo: None,
            retry_hint: None,
            force_summary: false,
            cancel_token: &token,
        };
        let reply = planner.request(&ctx, "role", &output_format(false), None).await.unwrap();
        let summary = reply.summary.unwrap();
        assert_eq!(summary.summary, "Scrolled three times.");
        assert_eq!(summary.covered_through, 3);
        assert_eq!(llm.call_count(), 2);
        let planner_msg = &llm.requests()[1][1].content;
        assert!(planner_msg.contains("Summary of iterations 1-3"));
        assert!(!planner_msg.contains("scroll down 1"));
    }

    #[test]
    fn test_output_format_mentions_todo_only_for_checklist() {
        assert!(output_format(true).contains("## TODO"));
        assert!(!output_format(false).contains("## TODO"));
    }
}
