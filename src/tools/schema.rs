//! 工具参数 JSON Schema（schemars 自动生成）
//!
//! 内置工具的参数结构体同时用于反序列化与生成 schema，保证两者一致。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 传给 tool calling LLM 的单个工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 由参数结构体生成 JSON Schema；去掉 `$schema` / `title` 等 LLM 不需要的字段
pub fn args_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({ "type": "object", "properties": {} })
    });
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// done 工具参数
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct DoneArgs {
    /// 对已完成动作的简短总结
    #[serde(default)]
    pub summary: Option<String>,
}

/// request_human_input 工具参数
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct HumanInputArgs {
    /// 需要用户完成的操作（如：登录、输入验证码）
    #[serde(default)]
    pub reason: Option<String>,
}

/// echo 工具参数
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EchoArgs {
    pub text: String,
}
