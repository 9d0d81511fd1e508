//! 工具层：注册表、执行器（超时 / 审计 / 信号检测）与内置工具

pub mod echo;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod signals;

pub use echo::EchoTool;
pub use executor::{DispatchOutcome, ToolCallRecord, ToolExecutor};
pub use registry::{Tool, ToolRegistry, ToolSignal};
pub use schema::{args_schema, ToolSchema};
pub use signals::{DoneTool, HumanInputTool, DONE_TOOL, HUMAN_INPUT_TOOL};
