//! Bee Pilot - 规划 / 执行双阶段的自主任务循环
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器主循环、错误与恢复、运行状态、人工介入、进度事件
//! - **environment**: 环境快照（Executor 第一遍的状态文本 / 截图）
//! - **execution**: Executor 有界工具调用子循环
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 执行历史、历史摘要与 token 预算
//! - **observability**: 日志初始化
//! - **planning**: 动态 / 预定义两种规划策略、输出解析、TODO 清单
//! - **tools**: 工具注册表、执行器与内置工具（done、request_human_input、echo）

pub mod config;
pub mod core;
pub mod environment;
pub mod execution;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planning;
pub mod tools;

pub use crate::core::{Orchestrator, OrchestratorBuilder, RunReport};
