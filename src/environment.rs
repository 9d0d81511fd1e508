//! 环境快照
//!
//! Executor 第一遍需要一段描述当前状态的文本（可附带截图）。浏览器、桌面等实际环境实现
//! `EnvironmentProvider`；`StaticEnvironment` 用于测试与命令行。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::AgentError;

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOptions {
    pub include_screenshot: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    pub text: String,
    /// base64 或 data URL
    pub image: Option<String>,
}

#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    async fn state_text(&self, options: &SnapshotOptions) -> Result<EnvironmentSnapshot, AgentError>;
}

/// 固定文本的环境，可随时替换内容
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    snapshot: Mutex<EnvironmentSnapshot>,
}

impl StaticEnvironment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            snapshot: Mutex::new(EnvironmentSnapshot {
                text: text.into(),
                image: None,
            }),
        }
    }

    pub async fn set_text(&self, text: impl Into<String>) {
        self.snapshot.lock().await.text = text.into();
    }

    pub async fn set_image(&self, image: Option<String>) {
        self.snapshot.lock().await.image = image;
    }
}

#[async_trait]
impl EnvironmentProvider for StaticEnvironment {
    async fn state_text(&self, options: &SnapshotOptions) -> Result<EnvironmentSnapshot, AgentError> {
        let snapshot = self.snapshot.lock().await.clone();
        Ok(EnvironmentSnapshot {
            image: snapshot.image.filter(|_| options.include_screenshot),
            text: snapshot.text,
        })
    }
}
