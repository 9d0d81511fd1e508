//! 人工介入通道
//!
//! Executor 报告 requires_human_input 后，Orchestrator 在这里挂起，直到 UI 点击「继续」或「终止」。
//! 等待与运行的取消令牌竞争，取消时立即返回而不是一直挂起。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanResponse {
    Continue,
    Abort,
}

/// 外部解决的人工介入通道
#[async_trait]
pub trait HumanEscalation: Send + Sync {
    async fn wait_for_response(&self) -> HumanResponse;
}

/// 基于 mpsc 的实现：UI 侧持有 HumanHandle，运行侧持有 ChannelHumanEscalation
pub struct ChannelHumanEscalation {
    rx: Mutex<mpsc::UnboundedReceiver<HumanResponse>>,
}

/// UI 侧句柄，可克隆
#[derive(Clone)]
pub struct HumanHandle {
    tx: mpsc::UnboundedSender<HumanResponse>,
}

impl HumanHandle {
    /// 返回 false 表示运行侧已经结束
    pub fn resolve(&self, response: HumanResponse) -> bool {
        self.tx.send(response).is_ok()
    }
}

pub fn human_channel() -> (HumanHandle, ChannelHumanEscalation) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        HumanHandle { tx },
        ChannelHumanEscalation { rx: Mutex::new(rx) },
    )
}

#[async_trait]
impl HumanEscalation for ChannelHumanEscalation {
    async fn wait_for_response(&self) -> HumanResponse {
        // 所有 HumanHandle 都已丢弃：没人能再点「继续」，按终止处理
        self.rx.lock().await.recv().await.unwrap_or(HumanResponse::Abort)
    }
}

/// 等待人工结果；Continue -> Ok，Abort -> HumanAbort，取消 -> Cancelled
pub async fn wait_for_human(
    escalation: &dyn HumanEscalation,
    cancel_token: &CancellationToken,
) -> Result<(), AgentError> {
    tokio::select! {
        _ = cancel_token.cancelled() => Err(AgentError::Cancelled),
        response = escalation.wait_for_response() => match response {
            HumanResponse::Continue => Ok(()),
            HumanResponse::Abort => Err(AgentError::HumanAbort),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_continue_and_abort() {
        let (handle, escalation) = human_channel();
        let token = CancellationToken::new();
        handle.resolve(HumanResponse::Continue);
        assert!(wait_for_human(&escalation, &token).await.is_ok());
        handle.resolve(HumanResponse::Abort);
        assert!(matches!(
            wait_for_human(&escalation, &token).await,
            Err(AgentError::HumanAbort)
        ));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_does_not_hang() {
        let (_handle, escalation) = human_channel();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            wait_for_human(&escalation, &token),
        )
        .await
        .expect("wait should observe cancellation");
        assert!(matches!(result, Err(AgentError::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_handle_means_abort() {
        let (handle, escalation) = human_channel();
        drop(handle);
        let token = CancellationToken::new();
        assert!(matches!(
            wait_for_human(&escalation, &token).await,
            Err(AgentError::HumanAbort)
        ));
    }
}
