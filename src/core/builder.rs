//! Orchestrator 构建器：统一的初始化逻辑
//!
//! 命令行与测试共用同一套装配：LLM 客户端、工具注册表（始终包含 done / request_human_input）、
//! 两种规划策略、Executor、人工介入通道与进度输出。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::orchestrator::{Orchestrator, RunLimits};
use crate::core::{
    human_channel, AgentError, HumanEscalation, ProgressSink, SessionSupervisor,
    TracingProgressSink,
};
use crate::environment::{EnvironmentProvider, StaticEnvironment};
use crate::execution::Executor;
use crate::llm::{
    create_deepseek_client, LlmClient, MockLlmClient, MockToolClient, OpenAiClient,
    ToolCallingClient, DEEPSEEK_CHAT, DEEPSEEK_REASONER,
};
use crate::memory::{TokenBudget, TokenCounter, TokenEstimator};
use crate::planning::{DynamicPlanner, PlannerCore, PredefinedPlanner};
use crate::tools::{DoneTool, HumanInputTool, Tool, ToolExecutor, ToolRegistry};

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
///
/// 返回 (Planner 用的文本客户端, Executor 用的工具调用客户端)。
pub fn create_clients_from_config(
    cfg: &AppConfig,
) -> (Arc<dyn LlmClient>, Arc<dyn ToolCallingClient>) {
    let provider = cfg.llm.provider.to_lowercase();
    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";
    let timeout = cfg.llm.timeouts.request;

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        let planner = Arc::new(create_deepseek_client(Some(&model)).with_request_timeout(timeout));
        // deepseek-reasoner 不支持 tool calling，Executor 改用 deepseek-chat
        if model == DEEPSEEK_REASONER {
            let executor =
                Arc::new(create_deepseek_client(Some(DEEPSEEK_CHAT)).with_request_timeout(timeout));
            (planner as Arc<dyn LlmClient>, executor as Arc<dyn ToolCallingClient>)
        } else {
            (
                planner.clone() as Arc<dyn LlmClient>,
                planner as Arc<dyn ToolCallingClient>,
            )
        }
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = cfg.llm.base_url.as_deref();
        tracing::info!("Using OpenAI LLM ({})", model);
        let client = Arc::new(
            OpenAiClient::new(
                base,
                &model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            )
            .with_request_timeout(timeout),
        );
        (
            client.clone() as Arc<dyn LlmClient>,
            client as Arc<dyn ToolCallingClient>,
        )
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        (
            Arc::new(MockLlmClient::new()) as Arc<dyn LlmClient>,
            Arc::new(MockToolClient::new()) as Arc<dyn ToolCallingClient>,
        )
    }
}

pub struct OrchestratorBuilder {
    config: AppConfig,
    text_llm: Option<Arc<dyn LlmClient>>,
    tool_llm: Option<Arc<dyn ToolCallingClient>>,
    tools: Vec<Arc<dyn Tool>>,
    environment: Option<Arc<dyn EnvironmentProvider>>,
    human: Option<Arc<dyn HumanEscalation>>,
    sink: Option<Arc<dyn ProgressSink>>,
    counter: Option<Arc<dyn TokenCounter>>,
    supervisor: Option<SessionSupervisor>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            text_llm: None,
            tool_llm: None,
            tools: Vec::new(),
            environment: None,
            human: None,
            sink: None,
            counter: None,
            supervisor: None,
        }
    }

    /// 指定 Planner / Executor 使用的客户端；不指定时按配置与环境变量选择
    pub fn with_llm(
        mut self,
        text: Arc<dyn LlmClient>,
        tools: Arc<dyn ToolCallingClient>,
    ) -> Self {
        self.text_llm = Some(text);
        self.tool_llm = Some(tools);
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn EnvironmentProvider>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_human(mut self, human: Arc<dyn HumanEscalation>) -> Self {
        self.human = Some(human);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn with_supervisor(mut self, supervisor: SessionSupervisor) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// 工具注册表：调用方的工具 + 两个信号工具
    fn build_tool_registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in &self.tools {
            registry.register_arc(tool.clone());
        }
        registry.register(DoneTool);
        registry.register(HumanInputTool);
        registry
    }

    fn validate(&self) -> Result<(), AgentError> {
        let planner = &self.config.planner;
        if planner.max_iterations_dynamic == 0 || planner.max_iterations_predefined == 0 {
            return Err(AgentError::ConfigError(
                "planner iteration ceilings must be positive".to_string(),
            ));
        }
        if planner.max_context_tokens == 0 {
            return Err(AgentError::ConfigError(
                "planner.max_context_tokens must be positive".to_string(),
            ));
        }
        if !(planner.summarize_ratio > 0.0 && planner.summarize_ratio <= 1.0) {
            return Err(AgentError::ConfigError(format!(
                "planner.summarize_ratio must be in (0, 1], got {}",
                planner.summarize_ratio
            )));
        }
        Ok(())
    }

    pub fn build(self) -> Result<Orchestrator, AgentError> {
        self.validate()?;
        let cfg = &self.config;

        let (text_llm, tool_llm) = match (self.text_llm.clone(), self.tool_llm.clone()) {
            (Some(text), Some(tools)) => (text, tools),
            _ => create_clients_from_config(cfg),
        };
        let counter = self
            .counter
            .clone()
            .unwrap_or_else(|| Arc::new(TokenEstimator));
        let budget = TokenBudget::new(cfg.planner.max_context_tokens)
            .with_summarize_ratio(cfg.planner.summarize_ratio);

        let tools = Arc::new(ToolExecutor::new(
            self.build_tool_registry(),
            cfg.tools.tool_timeout_secs,
        ));
        tracing::info!(tools = ?tools.tool_names(), "tool registry ready");
        let catalog = tools.tool_catalog();

        let core = || {
            PlannerCore::new(text_llm.clone(), counter.clone(), budget, catalog.clone())
                .with_retries(cfg.llm.retries)
        };
        let dynamic = Box::new(DynamicPlanner::new(core()));
        let predefined = Box::new(PredefinedPlanner::new(core()));

        let environment = self
            .environment
            .clone()
            .unwrap_or_else(|| Arc::new(StaticEnvironment::new("(no environment attached)")));
        let executor = Executor::new(tool_llm, tools, environment)
            .with_max_passes(cfg.executor.max_passes)
            .with_retries(cfg.llm.retries)
            .with_screenshot(cfg.executor.include_screenshot);

        // 没有人工通道时，句柄立即丢弃：需要人工的步骤按终止处理
        let human = self.human.clone().unwrap_or_else(|| {
            let (_handle, escalation) = human_channel();
            Arc::new(escalation)
        });
        let sink = self
            .sink
            .clone()
            .unwrap_or_else(|| Arc::new(TracingProgressSink));

        Ok(Orchestrator::new(
            dynamic,
            predefined,
            executor,
            human,
            sink,
            self.supervisor.clone().unwrap_or_default(),
            text_llm,
            RunLimits::from_config(cfg),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, DONE_TOOL, HUMAN_INPUT_TOOL};

    fn mock_builder(config: AppConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config).with_llm(
            Arc::new(MockLlmClient::new()),
            Arc::new(MockToolClient::new()),
        )
    }

    #[test]
    fn test_registry_always_has_signal_tools() {
        let builder = mock_builder(AppConfig::default()).with_tool(EchoTool);
        let names = builder.build_tool_registry().tool_names();
        assert!(names.contains(&DONE_TOOL.to_string()));
        assert!(names.contains(&HUMAN_INPUT_TOOL.to_string()));
        assert!(names.contains(&"echo".to_string()));
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let mut cfg = AppConfig::default();
        cfg.planner.summarize_ratio = 1.5;
        assert!(matches!(
            mock_builder(cfg).build(),
            Err(AgentError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_run_completes_with_echo() {
        let orchestrator = mock_builder(AppConfig::default()).build().unwrap();
        let report = orchestrator.execute("say hello", None).await.unwrap();
        assert_eq!(report.iterations, 1);
        assert!(report.final_answer.contains("say hello"));
    }
}
