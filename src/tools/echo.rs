//! Echo 工具（测试与离线演示用）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::schema::{args_schema, EchoArgs};
use crate::tools::Tool;

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back as the observation (for testing)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<EchoArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: EchoArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid args: {e}"))?;
        Ok(args.text)
    }
}
