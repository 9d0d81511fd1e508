//! OpenAI 兼容 API 客户端
//!
//! 文本完成通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；
//! tool calling 直接向 `/chat/completions` 发送带 `tools` 的 JSON 请求，便于附带截图与兼容各家代理。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{
    with_retries, CompletionOptions, LlmClient, LlmError, LlmResponse, LlmToolCall, Message,
    Role, ToolCallResponse, ToolCallingClient,
};
use crate::tools::ToolSchema;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：同时实现 LlmClient（Planner / 摘要）与 ToolCallingClient（Executor）
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());
        let api_base = base_url
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let config = OpenAIConfig::new()
            .with_api_base(api_base.clone())
            .with_api_key(api_key.clone());

        Self {
            client: Client::with_config(config),
            http: reqwest::Client::new(),
            api_base,
            api_key,
            model: model.to_string(),
            request_timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }

    /// 单次请求超时（秒），对应配置 [llm.timeouts].request
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(secs);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_messages(
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                let built = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                built.map_err(|e| LlmError::InvalidResponse(e.to_string()))
            })
            .collect()
    }

    async fn complete_once(&self, messages: &[Message], temperature: Option<f32>) -> Result<String, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(Self::to_openai_messages(messages)?);
        if let Some(t) = temperature {
            args.temperature(t);
        }
        let request = args
            .build()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| classify_api_error(&e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    async fn complete_with_tools_once(
        &self,
        body: &Value,
    ) -> Result<ToolCallResponse, LlmError> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited {
                retry_after_ms: 2000,
            });
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_api_error(&payload.to_string()));
        }

        if let Some(usage) = payload.get("usage") {
            let prompt = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
            let completion = usage
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            self.usage.add(prompt, completion);
        }

        parse_tool_call_response(&payload)
    }
}

/// 将 API 错误文本归类：上下文超限不可重试，其余按普通 API 错误处理
fn classify_api_error(text: &str) -> LlmError {
    let lower = text.to_lowercase();
    if lower.contains("context_length_exceeded") || lower.contains("maximum context length") {
        LlmError::ContextWindowExceeded
    } else if lower.contains("rate limit") {
        LlmError::RateLimited {
            retry_after_ms: 2000,
        }
    } else {
        LlmError::ApiError(text.to_string())
    }
}

fn to_wire_message(m: &Message) -> Value {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    match &m.image {
        Some(image) => json!({
            "role": role,
            "content": [
                { "type": "text", "text": m.content },
                { "type": "image_url", "image_url": { "url": image } }
            ]
        }),
        None => json!({ "role": role, "content": m.content }),
    }
}

fn build_tool_request(model: &str, messages: &[Message], tools: &[ToolSchema], temperature: Option<f32>) -> Value {
    let tools: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect();
    let mut body = json!({
        "model": model,
        "messages": messages.iter().map(to_wire_message).collect::<Vec<_>>(),
        "tools": tools,
        "tool_choice": "auto",
    });
    if let Some(t) = temperature {
        body["temperature"] = json!(t);
    }
    body
}

/// 解析 choices[0].message：arguments 是 JSON 字符串，解析失败时保留原文
fn parse_tool_call_response(payload: &Value) -> Result<ToolCallResponse, LlmError> {
    let message = payload
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(String::from);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let id = c.get("id").and_then(Value::as_str).unwrap_or_default();
                    let function = c.get("function")?;
                    let name = function.get("name").and_then(Value::as_str)?;
                    let raw = function
                        .get("arguments")
                        .and_then(Value::as_str)
                        .unwrap_or("{}");
                    let args = serde_json::from_str(raw).unwrap_or_else(|_| json!({ "raw": raw }));
                    Some(LlmToolCall::new(id, name, args))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ToolCallResponse {
        content,
        tool_calls,
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<LlmResponse, LlmError> {
        let temperature = options.temperature;
        let content = with_retries(options, RETRY_BACKOFF, move || {
            self.complete_once(messages, temperature)
        })
        .await?;
        Ok(LlmResponse { content })
    }
}

#[async_trait]
impl ToolCallingClient for OpenAiClient {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> Result<ToolCallResponse, LlmError> {
        let body = build_tool_request(&self.model, messages, tools, options.temperature);
        let body = &body;
        with_retries(options, RETRY_BACKOFF, move || self.complete_with_tools_once(body)).await
    }
}
