//! 编排器：Planner ⇄ Executor 主循环
//!
//! 每次 `execute()` 构造一个新的 ExecutionContext，选定规划策略后循环：
//! 规划（单轮内有限重试）→ 更新清单 → 完成则返回 → 否则交给 Executor → 必要时等待人工 → 归档本轮历史。
//! 迭代上限、取消与人工终止都以类型化错误结束运行。

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::human::wait_for_human;
use crate::core::special_tasks::match_special_task;
use crate::core::{
    AgentError, ExecutionContext, ExecutionMetrics, HumanEscalation, ProgressKind, ProgressSink,
    ReasoningRecord, RecoveryAction, RecoveryEngine, RunPhase, SessionSupervisor, Task,
    TaskMetadata,
};
use crate::execution::Executor;
use crate::llm::LlmClient;
use crate::memory::{ExecutionHistory, ExecutionHistoryEntry};
use crate::planning::{
    PlannerOutput, PlanningContext, PlanningStrategy, StrategyKind, TodoList,
};

/// 运行上限（来自 [planner] / [executor] 配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub max_iterations_dynamic: u32,
    pub max_iterations_predefined: u32,
    /// 单轮内 Planner 的尝试次数
    pub max_retries: u32,
    /// 整个运行累计的 Executor pass 上限
    pub max_total_passes: u32,
}

impl RunLimits {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_iterations_dynamic: cfg.planner.max_iterations_dynamic,
            max_iterations_predefined: cfg.planner.max_iterations_predefined,
            max_retries: cfg.planner.max_retries.max(1),
            max_total_passes: cfg.executor.max_total_passes,
        }
    }

    pub fn ceiling(&self, kind: StrategyKind) -> u32 {
        match kind {
            StrategyKind::Dynamic => self.max_iterations_dynamic,
            StrategyKind::Predefined => self.max_iterations_predefined,
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 成功运行的结果
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub final_answer: String,
    pub iterations: u32,
    pub strategy: StrategyKind,
    pub metrics: ExecutionMetrics,
    pub todo: Option<TodoList>,
    /// 终止阶段；失败与取消以 `Err` 返回，其阶段见 `AgentError::terminal_phase`
    pub phase: RunPhase,
    /// 每次 Planner 尝试的推理与原始回复
    pub reasoning_log: Vec<ReasoningRecord>,
    #[serde(skip)]
    pub history: ExecutionHistory,
    /// (prompt, completion, total)，Planner 侧 LLM 的累计用量
    pub token_usage: (u64, u64, u64),
}

/// 确定任务与策略：显式计划 > 特殊任务 > 动态规划
pub fn resolve_task(text: &str, metadata: Option<TaskMetadata>) -> (Task, StrategyKind) {
    if let Some(plan) = metadata
        .and_then(|m| m.predefined_plan)
        .filter(|p| !p.is_empty())
    {
        return (Task::with_plan(text, plan), StrategyKind::Predefined);
    }
    if let Some(task) = match_special_task(text) {
        return (task, StrategyKind::Predefined);
    }
    (Task::new(text), StrategyKind::Dynamic)
}

pub struct Orchestrator {
    dynamic: Box<dyn PlanningStrategy>,
    predefined: Box<dyn PlanningStrategy>,
    executor: Executor,
    recovery: RecoveryEngine,
    human: Arc<dyn HumanEscalation>,
    sink: Arc<dyn ProgressSink>,
    supervisor: SessionSupervisor,
    llm: Arc<dyn LlmClient>,
    limits: RunLimits,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dynamic: Box<dyn PlanningStrategy>,
        predefined: Box<dyn PlanningStrategy>,
        executor: Executor,
        human: Arc<dyn HumanEscalation>,
        sink: Arc<dyn ProgressSink>,
        supervisor: SessionSupervisor,
        llm: Arc<dyn LlmClient>,
        limits: RunLimits,
    ) -> Self {
        Self {
            dynamic,
            predefined,
            executor,
            recovery: RecoveryEngine::new(),
            human,
            sink,
            supervisor,
            llm,
            limits,
        }
    }

    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    pub fn limits(&self) -> RunLimits {
        self.limits
    }

    fn strategy(&self, kind: StrategyKind) -> &dyn PlanningStrategy {
        match kind {
            StrategyKind::Dynamic => self.dynamic.as_ref(),
            StrategyKind::Predefined => self.predefined.as_ref(),
        }
    }

    /// 运行一个任务；取消由 SessionSupervisor 控制
    pub async fn execute(
        &self,
        task: &str,
        metadata: Option<TaskMetadata>,
    ) -> Result<RunReport, AgentError> {
        self.execute_with_cancel(task, metadata, self.supervisor.child_token())
            .await
    }

    /// 使用调用方提供的取消令牌运行
    pub async fn execute_with_cancel(
        &self,
        task: &str,
        metadata: Option<TaskMetadata>,
        cancel_token: CancellationToken,
    ) -> Result<RunReport, AgentError> {
        let (task, kind) = resolve_task(task, metadata);
        let mut ctx = ExecutionContext::new(task, kind, cancel_token);
        let span = tracing::info_span!("run", run_id = %ctx.run_id, strategy = %kind);

        let result = self.run_loop(&mut ctx).instrument(span).await;
        ctx.metrics.finish();

        match result {
            Ok((final_answer, token_usage)) => {
                tracing::info!(
                    run_id = %ctx.run_id,
                    iterations = ctx.iteration,
                    tool_calls = ctx.metrics.tool_calls,
                    errors = ctx.metrics.errors,
                    total_tokens = token_usage.2,
                    "run completed"
                );
                let phase = ctx.phase();
                Ok(RunReport {
                    run_id: ctx.run_id,
                    final_answer,
                    iterations: ctx.iteration,
                    strategy: kind,
                    metrics: ctx.metrics,
                    todo: ctx.todo,
                    phase,
                    reasoning_log: ctx.reasoning_log,
                    history: ctx.history,
                    token_usage,
                })
            }
            Err(e) => {
                let phase = e.terminal_phase();
                ctx.set_phase(phase);
                if phase == RunPhase::Aborted {
                    tracing::info!(run_id = %ctx.run_id, iterations = ctx.iteration, reason = %e, "run aborted");
                    self.sink.publish(&e.to_string(), ProgressKind::Cancelled);
                } else {
                    tracing::warn!(run_id = %ctx.run_id, iterations = ctx.iteration, error = %e, "run failed");
                    self.sink.publish(&e.to_string(), ProgressKind::Error);
                }
                Err(e)
            }
        }
    }

    /// 返回 (最终回答, 累计 token 用量)
    async fn run_loop(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<(String, (u64, u64, u64)), AgentError> {
        let planner = self.strategy(ctx.strategy);
        let ceiling = self.limits.ceiling(ctx.strategy);

        self.sink.publish(
            &format!("{} ({} plan)", ctx.task.text(), ctx.strategy),
            ProgressKind::Task,
        );
        if let Some(todo) = &ctx.todo {
            self.sink.publish(&todo.to_markdown(), ProgressKind::Todo);
        }

        while ctx.iteration < ceiling {
            ctx.ensure_not_cancelled()?;
            ctx.iteration += 1;
            ctx.set_phase(RunPhase::Planning);
            tracing::debug!(iteration = ctx.iteration, "planning");

            let output = self.plan_iteration(ctx, planner).await?;
            self.sink.publish(
                &format!(
                    "{}\n\nNext actions:\n{}",
                    output.reasoning(),
                    output.proposed_actions()
                ),
                ProgressKind::Plan,
            );

            if let Some(list) = output.todo_markdown().and_then(TodoList::parse_markdown) {
                self.sink.publish(&list.to_markdown(), ProgressKind::Todo);
                ctx.todo = Some(list);
            }

            if output.is_complete(ctx.todo.as_ref()) {
                let answer = if output.final_answer().trim().is_empty() {
                    output.reasoning().to_string()
                } else {
                    output.final_answer().to_string()
                };
                ctx.history
                    .push(ExecutionHistoryEntry::plan(output, Vec::new(), ctx.iteration));
                ctx.set_phase(RunPhase::Completed);
                let usage = self.llm.token_usage();
                self.sink.publish(
                    &format!(
                        "{answer}\n\nToken usage: prompt {}, completion {}, total {}",
                        usage.0, usage.1, usage.2
                    ),
                    ProgressKind::Complete,
                );
                return Ok((answer, usage));
            }

            ctx.ensure_not_cancelled()?;
            let pass_budget = self
                .limits
                .max_total_passes
                .saturating_sub(ctx.metrics.executor_passes);
            if pass_budget == 0 {
                return Err(AgentError::IterationBudgetExceeded {
                    mode: "execution".to_string(),
                    ceiling: self.limits.max_total_passes,
                });
            }

            ctx.set_phase(RunPhase::Executing);
            let mut tool_messages = Vec::new();
            let step = self
                .execute_step(ctx, output.proposed_actions(), pass_budget, &mut tool_messages)
                .await;
            // 无论结果如何，本轮的工具摘要都要归档
            ctx.history.push(ExecutionHistoryEntry::plan(
                output,
                tool_messages,
                ctx.iteration,
            ));
            step?;
        }

        Err(AgentError::IterationBudgetExceeded {
            mode: ctx.strategy.to_string(),
            ceiling,
        })
    }

    /// 单轮执行：Executor 子循环，必要时挂起等待人工
    async fn execute_step(
        &self,
        ctx: &mut ExecutionContext,
        proposed_actions: &str,
        pass_budget: u32,
        tool_messages: &mut Vec<String>,
    ) -> Result<(), AgentError> {
        let cancel_token = ctx.cancel_token().clone();
        let result = self
            .executor
            .run(
                &ctx.task,
                proposed_actions,
                pass_budget,
                &mut ctx.metrics,
                &cancel_token,
                self.sink.as_ref(),
                tool_messages,
            )
            .await?;
        tracing::debug!(
            iteration = ctx.iteration,
            passes = result.passes,
            done = result.done_signal,
            "executor finished"
        );

        if result.requires_human_input {
            ctx.set_phase(RunPhase::AwaitingHumanInput);
            self.sink.publish(
                "Human input required: complete the step in the environment, then continue or abort.",
                ProgressKind::HumanInput,
            );
            tracing::info!(iteration = ctx.iteration, "waiting for human input");
            wait_for_human(self.human.as_ref(), &cancel_token).await?;
            tool_messages.push("human input: resolved, continuing".to_string());
        }
        Ok(())
    }

    /// 单轮规划：输出不可用时带纠正提示重试，上下文超限时强制压缩历史后重试
    async fn plan_iteration(
        &self,
        ctx: &mut ExecutionContext,
        planner: &dyn PlanningStrategy,
    ) -> Result<PlannerOutput, AgentError> {
        let attempts = self.limits.max_retries.max(1);
        let mut hint: Option<String> = None;
        let mut force_summary = false;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            ctx.ensure_not_cancelled()?;
            let result = {
                let planning = PlanningContext {
                    task: &ctx.task,
                    history: &ctx.history,
                    metrics: &ctx.metrics,
                    todo: ctx.todo.as_ref(),
                    retry_hint: hint.as_deref(),
                    force_summary,
                    cancel_token: ctx.cancel_token(),
                };
                planner.plan(&planning).await
            };

            let err = match result {
                Ok(outcome) => {
                    if let Some(summary) = outcome.summary {
                        self.sink.publish(&summary.summary, ProgressKind::Summary);
                        ctx.history.replace_with_summary(summary);
                        force_summary = false;
                    }
                    // 校验用本次回复里的清单（若有），否则用当前清单
                    let reply_todo = outcome
                        .output
                        .todo_markdown()
                        .and_then(TodoList::parse_markdown);
                    let checked = outcome
                        .output
                        .validate(reply_todo.as_ref().or(ctx.todo.as_ref()));
                    if checked.is_err() {
                        tracing::debug!(raw = %outcome.raw, "unusable planner reply");
                    }
                    ctx.reasoning_log.push(ReasoningRecord {
                        iteration: ctx.iteration,
                        attempt,
                        reasoning: outcome.output.reasoning().to_string(),
                        raw: outcome.raw,
                    });
                    match checked {
                        Ok(()) => return Ok(outcome.output),
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            if err.is_cancellation() {
                return Err(err);
            }
            tracing::warn!(
                iteration = ctx.iteration,
                attempt,
                error = %err,
                "planner attempt failed"
            );
            last_error = err.to_string();
            match self.recovery.handle(&err) {
                RecoveryAction::RetryWithPrompt(prompt) => hint = Some(prompt),
                RecoveryAction::SummarizeAndPrune => force_summary = true,
                RecoveryAction::Abort => return Err(err),
            }
        }

        Err(AgentError::PlanningFailed {
            attempts,
            last_error,
        })
    }
}
