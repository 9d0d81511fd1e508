//! 执行层：把 Planner 提议的动作交给工具调用 LLM，在有限的 pass 内执行完

pub mod executor;

pub use executor::{Executor, ExecutorResult};
