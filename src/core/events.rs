//! 进度事件：用于 UI / 日志展示计划、动作、观察与结果
//!
//! 只写不读，循环的控制流从不依赖这里的任何东西。

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// 任务开始 / 策略选择
    Task,
    /// Planner 的推理与下一步动作
    Plan,
    /// 预定义计划的 TODO 清单
    Todo,
    /// Executor 调用工具
    Action,
    /// 工具返回（预览）
    Observation,
    /// 等待人工介入
    HumanInput,
    /// 执行历史被压缩
    Summary,
    /// 最终回答
    Complete,
    Error,
    Cancelled,
}

/// 单条进度事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub text: String,
}

pub trait ProgressSink: Send + Sync {
    fn publish(&self, text: &str, kind: ProgressKind);
}

/// 丢弃所有事件
#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn publish(&self, _text: &str, _kind: ProgressKind) {}
}

/// 写入 tracing 日志
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn publish(&self, text: &str, kind: ProgressKind) {
        match kind {
            ProgressKind::Error => tracing::warn!(?kind, "{}", text),
            _ => tracing::info!(?kind, "{}", text),
        }
    }
}

/// 通过 unbounded mpsc 推送给前端；接收端关闭后静默丢弃
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn publish(&self, text: &str, kind: ProgressKind) {
        let _ = self.tx.send(ProgressEvent {
            kind,
            text: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelProgressSink::new();
        sink.publish("clicked", ProgressKind::Action);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, ProgressKind::Action);
        assert_eq!(ev.text, "clicked");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "action");
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelProgressSink::new();
        drop(rx);
        sink.publish("nobody listens", ProgressKind::Plan);
    }
}
