//! 运行阶段状态机
//!
//! Initializing → {Planning ⇄ Executing} → AwaitingHumanInput → Completed | Failed | Aborted

use serde::Serialize;

/// 单次 `execute()` 的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Initializing,
    Planning,
    Executing,
    AwaitingHumanInput,
    Completed,
    Failed,
    Aborted,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed | RunPhase::Aborted)
    }

    /// 合法转移；任何非终止阶段都可以直接进入 Failed / Aborted
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) | (_, Aborted) => true,
            (Initializing, Planning) => true,
            (Planning, Executing) | (Planning, Completed) | (Planning, Planning) => true,
            (Executing, Planning) | (Executing, AwaitingHumanInput) => true,
            (AwaitingHumanInput, Planning) => true,
            _ => false,
        }
    }
}
