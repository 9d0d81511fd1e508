//! Bee Pilot 命令行
//!
//! 用法：`bee-pilot <任务描述>`。进度打印到 stdout；需要人工介入时，在 stdin 输入
//! `continue` 或 `abort`；Ctrl+C 取消当前运行。

use std::sync::Arc;

use anyhow::Context;
use bee_pilot::config::{load_config, AppConfig};
use bee_pilot::core::{
    human_channel, ChannelProgressSink, HumanResponse, OrchestratorBuilder, ProgressKind,
    SessionSupervisor,
};
use bee_pilot::environment::StaticEnvironment;
use bee_pilot::observability;
use bee_pilot::tools::EchoTool;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let task = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if task.trim().is_empty() {
        anyhow::bail!("usage: bee-pilot <task>");
    }

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let (sink, mut events) = ChannelProgressSink::new();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.kind {
                ProgressKind::HumanInput => {
                    println!("[HumanInput] {}\n> type `continue` or `abort`", event.text)
                }
                kind => println!("[{:?}] {}", kind, event.text),
            }
        }
    });

    // stdin 的每一行作为人工介入的回复
    let (handle, escalation) = human_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let response = match line.trim().to_lowercase().as_str() {
                "continue" | "c" | "" => HumanResponse::Continue,
                "abort" | "a" | "q" => HumanResponse::Abort,
                other => {
                    eprintln!("unknown reply {other:?}, expected continue / abort");
                    continue;
                }
            };
            if !handle.resolve(response) {
                break;
            }
        }
    });

    let supervisor = SessionSupervisor::new();
    let ctrl_c = supervisor.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, cancelling");
            ctrl_c.cancel();
        }
    });

    let orchestrator = OrchestratorBuilder::new(cfg)
        .with_tool(EchoTool)
        .with_environment(Arc::new(StaticEnvironment::new("(headless: no browser attached)")))
        .with_human(Arc::new(escalation))
        .with_sink(Arc::new(sink))
        .with_supervisor(supervisor)
        .build()
        .context("Failed to build orchestrator")?;

    let result = orchestrator.execute(&task, None).await;
    drop(orchestrator);
    let _ = printer.await;

    let report = result.context("Run failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
