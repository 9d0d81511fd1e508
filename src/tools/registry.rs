//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 注册表同时生成两种视图：Planner 使用的文字版工具目录，Executor 使用的 tool calling schema。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::ToolSchema;

/// 特殊工具在成功执行后向 Executor 发出的控制信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSignal {
    /// 当前规划的动作已全部完成
    Done,
    /// 需要人工介入（登录、验证码、确认支付等）
    RequiresHumanInput,
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、可选控制信号、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（tool call 中的 function name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn signal(&self) -> Option<ToolSignal> {
        None
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具注册表：按名称有序存储 Arc<dyn Tool>，保证 prompt 中的工具顺序稳定
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 返回 (name, description) 列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect()
    }

    /// Planner prompt 中的 Available tools 段落
    pub fn tool_catalog(&self) -> String {
        self.tools
            .values()
            .map(|tool| {
                format!(
                    "- {}: {}\n  args: {}",
                    tool.name(),
                    tool.description(),
                    compact_properties(&tool.parameters_schema())
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Executor 使用的 tool calling schema 列表
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

/// 只列出参数名，完整 schema 留给 tool calling
fn compact_properties(schema: &Value) -> String {
    match schema.get("properties").and_then(Value::as_object) {
        Some(props) if !props.is_empty() => props.keys().cloned().collect::<Vec<_>>().join(", "),
        _ => "(none)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{DoneTool, EchoTool};

    #[test]
    fn test_catalog_is_sorted_and_lists_args() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(DoneTool);
        let catalog = registry.tool_catalog();
        let done_pos = catalog.find("- done").unwrap();
        let echo_pos = catalog.find("- echo").unwrap();
        assert!(done_pos < echo_pos);
        assert!(catalog.contains("text"));
    }

    #[test]
    fn test_schemas_match_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
        assert_eq!(schemas[0].parameters["type"], "object");
    }
}
