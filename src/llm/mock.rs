//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按脚本顺序返回预设回复；脚本用完后重复最后一条。未设置脚本时，
//! 文本客户端直接宣告任务完成并回显最后一条 User 消息的首行正文，工具客户端则不调用任何工具。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{
    CompletionOptions, LlmClient, LlmError, LlmResponse, LlmToolCall, Message, Role,
    ToolCallResponse, ToolCallingClient,
};
use crate::tools::ToolSchema;

/// 脚本队列：按序弹出，用完后重复最后一条
#[derive(Debug)]
struct Script<T: Clone> {
    queue: VecDeque<T>,
    last: Option<T>,
}

impl<T: Clone> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            last: None,
        }
    }
}

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Option<T> {
        if let Some(item) = self.queue.pop_front() {
            self.last = Some(item.clone());
            return Some(item);
        }
        self.last.clone()
    }
}

/// 脚本化文本客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<Script<Result<String, LlmError>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for r in responses {
            client.push_response(r);
        }
        client
    }

    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut s) = self.script.lock() {
            s.queue.push_back(Ok(response.into()));
        }
    }

    pub fn push_error(&self, error: LlmError) {
        if let Ok(mut s) = self.script.lock() {
            s.queue.push_back(Err(error));
        }
    }

    /// 已被调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用收到的完整消息列表
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn fallback(messages: &[Message]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        format!(
            "## Reasoning\nMock planner has nothing to do.\n\n## Task Complete\ntrue\n\n## Final Answer\nEcho from Mock: {}",
            last_user
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty() && !l.starts_with('#'))
                .unwrap_or_default()
        )
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<LlmResponse, LlmError> {
        if options.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.next());
        match next {
            Some(Ok(content)) => Ok(LlmResponse { content }),
            Some(Err(e)) => Err(e),
            None => Ok(LlmResponse {
                content: Self::fallback(messages),
            }),
        }
    }
}

/// 脚本化工具调用客户端：每次调用返回一批 tool call
#[derive(Debug, Default)]
pub struct MockToolClient {
    script: Mutex<Script<Vec<LlmToolCall>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockToolClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batches<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = Vec<LlmToolCall>>,
    {
        let client = Self::default();
        for b in batches {
            client.push_batch(b);
        }
        client
    }

    pub fn push_batch(&self, calls: Vec<LlmToolCall>) {
        if let Ok(mut s) = self.script.lock() {
            s.queue.push_back(calls);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolCallingClient for MockToolClient {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> Result<ToolCallResponse, LlmError> {
        if options.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
        let tool_calls = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.next())
            .unwrap_or_default();
        Ok(ToolCallResponse {
            content: None,
            tool_calls,
        })
    }
}
