//! Executor：有界的工具调用子循环
//!
//! 第一遍把环境快照（可带截图）与 Planner 的动作原样交给工具调用 LLM；之后每遍只要求核对结果。
//! 最多 `max_passes` 遍。LLM 不再调用工具、调用 `done` 或 `request_human_input` 时立即结束。
//! 每次工具调用的单行摘要写入调用方传入的缓冲区，无论成功失败都由 Orchestrator 归档。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, ExecutionMetrics, ProgressKind, ProgressSink, Task};
use crate::environment::{EnvironmentProvider, SnapshotOptions};
use crate::llm::{CompletionOptions, Message, ToolCallingClient};
use crate::tools::{ToolExecutor, DONE_TOOL, HUMAN_INPUT_TOOL};

pub const DEFAULT_MAX_PASSES: u32 = 3;

const EXECUTOR_SYSTEM_PROMPT: &str = "You are the executor of an autonomous agent. \
Carry out the proposed actions by calling the available tools, one step at a time. \
Do not invent extra steps beyond the proposed actions.";

/// 一次 Executor 调用的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorResult {
    /// 以信号结束（done 或需要人工），而不是跑满 pass 或无工具调用
    pub completed: bool,
    pub done_signal: bool,
    pub requires_human_input: bool,
    pub passes: u32,
}

pub struct Executor {
    llm: Arc<dyn ToolCallingClient>,
    tools: Arc<ToolExecutor>,
    environment: Arc<dyn EnvironmentProvider>,
    max_passes: u32,
    retries: u32,
    include_screenshot: bool,
}

impl Executor {
    pub fn new(
        llm: Arc<dyn ToolCallingClient>,
        tools: Arc<ToolExecutor>,
        environment: Arc<dyn EnvironmentProvider>,
    ) -> Self {
        Self {
            llm,
            tools,
            environment,
            max_passes: DEFAULT_MAX_PASSES,
            retries: 0,
            include_screenshot: true,
        }
    }

    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_screenshot(mut self, include: bool) -> Self {
        self.include_screenshot = include;
        self
    }

    pub fn max_passes(&self) -> u32 {
        self.max_passes
    }

    /// 快照失败不终止运行，用一行说明代替
    async fn first_pass_message(
        &self,
        task: &Task,
        proposed_actions: &str,
    ) -> Result<Message, AgentError> {
        let options = SnapshotOptions {
            include_screenshot: self.include_screenshot,
        };
        let (state, image) = match self.environment.state_text(&options).await {
            Ok(snapshot) => (snapshot.text, snapshot.image),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "environment snapshot failed");
                (format!("(environment unavailable: {e})"), None)
            }
        };
        let text = format!(
            "# Task\n{}\n\n# Current State\n{}\n\n# Proposed Actions\n{}\n\n\
Execute the proposed actions with the tools. \
When they are all finished, call `{DONE_TOOL}`. \
If you cannot continue without a human (login, captcha, confirmation), call `{HUMAN_INPUT_TOOL}`.",
            task.text(),
            state,
            proposed_actions
        );
        Ok(Message::user(text).with_image(image))
    }

    /// 执行一批提议动作
    ///
    /// `pass_budget` 为运行剩余的累计 pass 额度，本次最多 `min(max_passes, pass_budget)` 遍。
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        task: &Task,
        proposed_actions: &str,
        pass_budget: u32,
        metrics: &mut ExecutionMetrics,
        cancel_token: &CancellationToken,
        sink: &dyn ProgressSink,
        tool_messages: &mut Vec<String>,
    ) -> Result<ExecutorResult, AgentError> {
        let limit = self.max_passes.min(pass_budget);
        let schemas = self.tools.schemas();
        let options = CompletionOptions::new(self.retries).with_cancel_token(cancel_token.clone());
        let mut messages = vec![
            Message::system(EXECUTOR_SYSTEM_PROMPT),
            self.first_pass_message(task, proposed_actions).await?,
        ];
        let mut result = ExecutorResult::default();

        for pass in 1..=limit {
            if cancel_token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if pass > 1 {
                messages.push(Message::user(format!(
                    "Check the results above against the proposed actions. \
If they are all done, call `{DONE_TOOL}`. Otherwise call the tools for what is left."
                )));
            }

            metrics.record_pass();
            result.passes = pass;
            let response = self
                .llm
                .complete_with_tools(&messages, &schemas, &options)
                .await?;

            if response.tool_calls.is_empty() {
                tracing::debug!(pass, "executor returned no tool calls");
                return Ok(result);
            }

            for call in &response.tool_calls {
                sink.publish(&format!("{}({})", call.name, call.args), ProgressKind::Action);
            }
            let outcome = self.tools.dispatch(&response.tool_calls).await;

            let mut results = String::from("Tool results:\n");
            for record in &outcome.records {
                metrics.record_tool_result(record.is_error());
                let line = record.summary_line();
                sink.publish(&line, ProgressKind::Observation);
                results.push_str(&format!("- {line}\n"));
                tool_messages.push(line);
            }

            let called: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
            let mut assistant = response.content.unwrap_or_default();
            if !assistant.is_empty() {
                assistant.push('\n');
            }
            assistant.push_str(&format!("Called: {}", called.join(", ")));
            messages.push(Message::assistant(assistant));
            messages.push(Message::user(results));

            if outcome.has_signal() {
                result.completed = true;
                result.done_signal = outcome.done;
                result.requires_human_input = outcome.requires_human_input;
                tracing::info!(
                    pass,
                    done = outcome.done,
                    requires_human_input = outcome.requires_human_input,
                    "executor signalled"
                );
                return Ok(result);
            }
        }

        tracing::info!(passes = limit, "executor pass limit reached without done");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::NoopProgressSink;
    use crate::environment::{EnvironmentSnapshot, StaticEnvironment};
    use crate::llm::{LlmToolCall, MockToolClient};
    use crate::tools::{DoneTool, EchoTool, HumanInputTool, ToolRegistry};
    use async_trait::async_trait;

    fn tools() -> Arc<ToolExecutor> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(DoneTool);
        registry.register(HumanInputTool);
        Arc::new(ToolExecutor::new(registry, 5))
    }

    fn echo(text: &str) -> LlmToolCall {
        LlmToolCall::new("c1", "echo", json!({ "text": text }))
    }

    async fn run(llm: Arc<MockToolClient>, env: Arc<dyn EnvironmentProvider>) -> (ExecutorResult, ExecutionMetrics, Vec<String>) {
        let executor = Executor::new(llm, tools(), env);
        let mut metrics = ExecutionMetrics::new();
        let mut messages = Vec::new();
        let result = executor
            .run(
                &Task::new("say hi"),
                "1. echo hi",
                u32::MAX,
                &mut metrics,
                &CancellationToken::new(),
                &NoopProgressSink,
                &mut messages,
            )
            .await
            .unwrap();
        (result, metrics, messages)
    }

    #[tokio::test]
    async fn test_stops_after_max_passes_without_done() {
        let llm = Arc::new(MockToolClient::with_batches([vec![echo("hi")]]));
        let (result, metrics, messages) =
            run(llm.clone(), Arc::new(StaticEnvironment::new("blank"))).await;
        assert!(!result.completed);
        assert_eq!(result.passes, 3);
        assert_eq!(llm.call_count(), 3);
        assert_eq!(metrics.executor_passes, 3);
        assert_eq!(metrics.tool_calls, 3);
        assert_eq!(messages.len(), 3);
    }

    #[tokio::test]
    async fn test_pass_budget_caps_passes() {
        let llm = Arc::new(MockToolClient::with_batches([vec![echo("hi")]]));
        let executor = Executor::new(llm.clone(), tools(), Arc::new(StaticEnvironment::new("blank")));
        let mut metrics = ExecutionMetrics::new();
        let result = executor
            .run(
                &Task::new("say hi"),
                "1. echo hi",
                2,
                &mut metrics,
                &CancellationToken::new(),
                &NoopProgressSink,
                &mut Vec::new(),
            )
            .await
            .unwrap();
        assert!(!result.completed);
        assert_eq!(result.passes, 2);
        assert_eq!(llm.call_count(), 2);
        assert_eq!(metrics.executor_passes, 2);
    }

    #[tokio::test]
    async fn test_done_signal_ends_immediately() {
        let llm = Arc::new(MockToolClient::with_batches([vec![
            echo("hi"),
            LlmToolCall::new("c2", DONE_TOOL, json!({})),
        ]]));
        let (result, _, messages) =
            run(llm.clone(), Arc::new(StaticEnvironment::new("blank"))).await;
        assert!(result.completed && result.done_signal);
        assert_eq!(result.passes, 1);
        assert_eq!(llm.call_count(), 1);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("echo("));
    }

    #[tokio::test]
    async fn test_human_input_signal() {
        let llm = Arc::new(MockToolClient::with_batches([vec![LlmToolCall::new(
            "c1",
            HUMAN_INPUT_TOOL,
            json!({ "reason": "captcha" }),
        )]]));
        let (result, _, _) = run(llm, Arc::new(StaticEnvironment::new("blank"))).await;
        assert!(result.requires_human_input);
        assert!(!result.done_signal);
    }

    #[tokio::test]
    async fn test_no_tool_calls_returns_incomplete() {
        let llm = Arc::new(MockToolClient::new());
        let (result, metrics, _) = run(llm, Arc::new(StaticEnvironment::new("blank"))).await;
        assert!(!result.completed);
        assert_eq!(result.passes, 1);
        assert_eq!(metrics.tool_calls, 0);
    }

    struct BrokenEnvironment;

    #[async_trait]
    impl EnvironmentProvider for BrokenEnvironment {
        async fn state_text(&self, _: &SnapshotOptions) -> Result<EnvironmentSnapshot, AgentError> {
            Err(AgentError::Environment("browser closed".into()))
        }
    }

    #[tokio::test]
    async fn test_environment_failure_is_not_fatal() {
        let llm = Arc::new(MockToolClient::new());
        run(llm.clone(), Arc::new(BrokenEnvironment)).await;
        let first = &llm.requests()[0][1].content;
        assert!(first.contains("(environment unavailable: Environment error: browser closed)"));
        assert!(first.contains("1. echo hi"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_pass() {
        let executor = Executor::new(
            Arc::new(MockToolClient::new()),
            tools(),
            Arc::new(StaticEnvironment::new("blank")),
        );
        let token = CancellationToken::new();
        token.cancel();
        let mut metrics = ExecutionMetrics::new();
        let err = executor
            .run(&Task::new("t"), "a", u32::MAX, &mut metrics, &token, &NoopProgressSink, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}
