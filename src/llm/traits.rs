//! LLM 客户端抽象
//!
//! 两种调用形态：
//! - `LlmClient::complete`：自由文本完成，供 Planner 与历史摘要使用；
//! - `ToolCallingClient::complete_with_tools`：带工具 schema 的完成，供 Executor 选择并调用工具。
//!
//! 重试次数与取消令牌由调用方通过 `CompletionOptions` 传入。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::llm::Message;
use crate::tools::ToolSchema;

/// LLM 调用错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out")]
    Timeout,

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("context window exceeded")]
    ContextWindowExceeded,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// 是否值得重试（取消与上下文超限重试无意义）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout | LlmError::RateLimited { .. } | LlmError::ApiError(_)
        )
    }
}

/// 单次调用选项：重试次数、取消令牌、温度
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// 失败后的额外重试次数（0 表示只调用一次）
    pub retries: u32,
    pub cancel_token: Option<CancellationToken>,
    pub temperature: Option<f32>,
}

impl CompletionOptions {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            ..Default::default()
        }
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }
}

/// 文本完成结果
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
}

/// LLM 请求调用的单个工具
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

impl LlmToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// 带工具的完成结果：可能只有文字、没有任何 tool call
#[derive(Debug, Clone, Default)]
pub struct ToolCallResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<LlmToolCall>,
}

/// 自由文本 LLM 客户端
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<LlmResponse, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 支持 tool calling 的 LLM 客户端
#[async_trait]
pub trait ToolCallingClient: Send + Sync {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> Result<ToolCallResponse, LlmError>;
}

/// 按 options.retries 重试一个请求；可重试错误之间线性退避，等待期间响应取消
pub async fn with_retries<T, F, Fut>(
    options: &CompletionOptions,
    base_backoff: Duration,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if options.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < options.retries => {
                attempt += 1;
                let delay = match &e {
                    LlmError::RateLimited { retry_after_ms } => {
                        Duration::from_millis(*retry_after_ms)
                    }
                    _ => base_backoff * attempt,
                };
                tracing::warn!(attempt, error = %e, "LLM request failed, retrying");
                match &options.cancel_token {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => return Err(LlmError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_with_retries_recovers_after_transient_errors() {
        let calls = AtomicU32::new(0);
        let options = CompletionOptions::new(2);
        let result = with_retries(&options, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Timeout)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_does_not_retry_context_overflow() {
        let calls = AtomicU32::new(0);
        let options = CompletionOptions::new(5);
        let result: Result<(), _> = with_retries(&options, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::ContextWindowExceeded) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::ContextWindowExceeded)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retries_stops_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let options = CompletionOptions::new(3).with_cancel_token(token);
        let result: Result<(), _> =
            with_retries(&options, Duration::from_millis(1), || async { Ok(()) }).await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
    }
}
