//! 核心层：错误与恢复、运行状态、执行上下文、人工介入、进度事件与编排器

pub mod builder;
pub mod context;
pub mod error;
pub mod events;
pub mod human;
pub mod metrics;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod special_tasks;
pub mod state;
pub mod task;

pub use builder::{create_clients_from_config, OrchestratorBuilder};
pub use context::{ExecutionContext, ReasoningRecord};
pub use error::{AgentError, RecoveryAction};
pub use events::{
    ChannelProgressSink, NoopProgressSink, ProgressEvent, ProgressKind, ProgressSink,
    TracingProgressSink,
};
pub use human::{
    human_channel, wait_for_human, ChannelHumanEscalation, HumanEscalation, HumanHandle,
    HumanResponse,
};
pub use metrics::ExecutionMetrics;
pub use orchestrator::{resolve_task, Orchestrator, RunLimits, RunReport};
pub use recovery::RecoveryEngine;
pub use session_supervisor::SessionSupervisor;
pub use special_tasks::{match_special_task, normalize_goal};
pub use state::RunPhase;
pub use task::{Plan, PlanStep, Task, TaskMetadata};
