//! 控制类工具：done 与 request_human_input
//!
//! 二者本身不做任何事，只通过 `Tool::signal` 通知 Executor 结束子循环。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::schema::{args_schema, DoneArgs, HumanInputArgs};
use crate::tools::{Tool, ToolSignal};

pub const DONE_TOOL: &str = "done";
pub const HUMAN_INPUT_TOOL: &str = "request_human_input";

/// 当前规划的动作全部执行完毕时调用
pub struct DoneTool;

#[async_trait]
impl Tool for DoneTool {
    fn name(&self) -> &str {
        DONE_TOOL
    }

    fn description(&self) -> &str {
        "Call when every proposed action has been carried out."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<DoneArgs>()
    }

    fn signal(&self) -> Option<ToolSignal> {
        Some(ToolSignal::Done)
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: DoneArgs = serde_json::from_value(args).unwrap_or_default();
        Ok(args
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "actions completed".to_string()))
    }
}

/// 需要用户亲自操作（登录、验证码等）时调用
pub struct HumanInputTool;

#[async_trait]
impl Tool for HumanInputTool {
    fn name(&self) -> &str {
        HUMAN_INPUT_TOOL
    }

    fn description(&self) -> &str {
        "Pause and ask the user to act (log in, solve a captcha, confirm a payment)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<HumanInputArgs>()
    }

    fn signal(&self) -> Option<ToolSignal> {
        Some(ToolSignal::RequiresHumanInput)
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: HumanInputArgs = serde_json::from_value(args).unwrap_or_default();
        Ok(format!(
            "waiting for user: {}",
            args.reason.unwrap_or_else(|| "manual action required".to_string())
        ))
    }
}
