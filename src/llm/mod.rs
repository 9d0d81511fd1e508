//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use message::{messages_text, Message, Role};
pub use mock::{MockLlmClient, MockToolClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{
    with_retries, CompletionOptions, LlmClient, LlmError, LlmResponse, LlmToolCall,
    ToolCallResponse, ToolCallingClient,
};
