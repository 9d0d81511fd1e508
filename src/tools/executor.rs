//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时。`execute` 在超时内调用单个工具，失败时转为 AgentError；
//! `dispatch` 按顺序执行 LLM 请求的一批 tool call，单个失败不中断整批，
//! 并检测 done / request_human_input 信号。每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::LlmToolCall;
use crate::tools::{ToolRegistry, ToolSchema, ToolSignal};

/// 结果预览最大字符数（写入执行历史的单行摘要）
const RESULT_PREVIEW_CHARS: usize = 300;

/// 单次工具调用的记录
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub id: String,
    pub tool: String,
    pub args: Value,
    pub outcome: Result<String, String>,
}

impl ToolCallRecord {
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// 写入执行历史的一行摘要：`tool(args) -> ok: ...` / `tool(args) -> error: ...`
    pub fn summary_line(&self) -> String {
        let (status, text) = match &self.outcome {
            Ok(out) => ("ok", out.as_str()),
            Err(err) => ("error", err.as_str()),
        };
        format!(
            "{}({}) -> {}: {}",
            self.tool,
            preview(&self.args.to_string(), 120),
            status,
            preview(&text.replace('\n', " "), RESULT_PREVIEW_CHARS)
        )
    }
}

/// 一批 tool call 的汇总结果
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub records: Vec<ToolCallRecord>,
    pub done: bool,
    pub requires_human_input: bool,
}

impl DispatchOutcome {
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_error()).count()
    }

    pub fn has_signal(&self) -> bool {
        self.done || self.requires_human_input
    }
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；未注册返回 HallucinatedTool，超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| AgentError::HallucinatedTool(tool_name.to_string()))?;

        let start = Instant::now();
        let args_preview = preview(&args.to_string(), 200);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(format!("{tool_name}: {e}"))),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }

    /// 顺序执行一批 tool call；遇到成功的信号工具后跳过本批剩余调用
    pub async fn dispatch(&self, calls: &[LlmToolCall]) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for (i, call) in calls.iter().enumerate() {
            let result = self.execute(&call.name, call.args.clone()).await;
            let succeeded = result.is_ok();
            outcome.records.push(ToolCallRecord {
                id: call.id.clone(),
                tool: call.name.clone(),
                args: call.args.clone(),
                outcome: result.map_err(|e| e.to_string()),
            });

            if !succeeded {
                continue;
            }
            match self.registry.get(&call.name).and_then(|t| t.signal()) {
                Some(ToolSignal::Done) => outcome.done = true,
                Some(ToolSignal::RequiresHumanInput) => outcome.requires_human_input = true,
                None => {}
            }
            if outcome.has_signal() {
                let skipped = calls.len() - i - 1;
                if skipped > 0 {
                    tracing::debug!(skipped, tool = %call.name, "signal received, skipping rest of batch");
                }
                break;
            }
        }
        outcome
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn tool_catalog(&self) -> String {
        self.registry.tool_catalog()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{DoneTool, EchoTool, HumanInputTool, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(DoneTool);
        registry.register(HumanInputTool);
        registry.register(SlowTool);
        ToolExecutor::new(registry, 1)
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recorded_not_fatal() {
        let exec = executor();
        let calls = vec![
            LlmToolCall::new("1", "teleport", json!({})),
            LlmToolCall::new("2", "echo", json!({"text": "hi"})),
        ];
        let outcome = exec.dispatch(&calls).await;
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.error_count(), 1);
        assert!(outcome.records[0].summary_line().contains("error"));
        assert_eq!(outcome.records[1].outcome.as_deref(), Ok("hi"));
        assert!(!outcome.has_signal());
    }

    #[tokio::test]
    async fn test_done_signal_stops_batch() {
        let exec = executor();
        let calls = vec![
            LlmToolCall::new("1", "done", json!({"summary": "clicked"})),
            LlmToolCall::new("2", "echo", json!({"text": "never"})),
        ];
        let outcome = exec.dispatch(&calls).await;
        assert!(outcome.done);
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_human_input_signal() {
        let exec = executor();
        let calls = vec![LlmToolCall::new("1", "request_human_input", json!({"reason": "captcha"}))];
        let outcome = exec.dispatch(&calls).await;
        assert!(outcome.requires_human_input);
        assert!(!outcome.done);
    }

    #[tokio::test]
    async fn test_tool_timeout() {
        let exec = executor();
        let err = exec.execute("slow", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(_)));
    }

    #[test]
    fn test_summary_line_is_single_line() {
        let record = ToolCallRecord {
            id: "1".into(),
            tool: "echo".into(),
            args: json!({"text": "a"}),
            outcome: Ok("line1\nline2".into()),
        };
        assert!(!record.summary_line().contains('\n'));
    }
}
