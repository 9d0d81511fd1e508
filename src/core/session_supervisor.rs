//! 会话监管：取消令牌
//!
//! 持有根 CancellationToken，用户 Stop / Ctrl+C 时取消；每次 `execute()` 使用一个子 token。

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 取消所有运行中的任务
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 创建子 token（用于单次运行）
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates_to_children() {
        let supervisor = SessionSupervisor::new();
        let child = supervisor.child_token();
        assert!(!child.is_cancelled());
        supervisor.cancel();
        assert!(child.is_cancelled());
        assert!(supervisor.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_affect_root() {
        let supervisor = SessionSupervisor::new();
        let child = supervisor.child_token();
        child.cancel();
        assert!(!supervisor.is_cancelled());
    }
}
