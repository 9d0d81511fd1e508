//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE__*` 覆盖（双下划线表示嵌套，如 `BEE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub planner: PlannerSection,
    pub executor: ExecutorSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择、超时与传输层重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
    /// 单次 LLM 调用失败后的重试次数
    #[serde(default = "default_llm_retries")]
    pub retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
            retries: default_llm_retries(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_llm_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [planner] 段：迭代上限、单轮重试次数与上下文预算
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_max_iterations_dynamic")]
    pub max_iterations_dynamic: u32,
    #[serde(default = "default_max_iterations_predefined")]
    pub max_iterations_predefined: u32,
    /// 单轮内 Planner 输出不可用时的尝试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default = "default_summarize_ratio")]
    pub summarize_ratio: f64,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_iterations_dynamic: default_max_iterations_dynamic(),
            max_iterations_predefined: default_max_iterations_predefined(),
            max_retries: default_max_retries(),
            max_context_tokens: default_max_context_tokens(),
            summarize_ratio: default_summarize_ratio(),
        }
    }
}

fn default_max_iterations_dynamic() -> u32 {
    50
}

fn default_max_iterations_predefined() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_context_tokens() -> usize {
    128_000
}

fn default_summarize_ratio() -> f64 {
    0.7
}

/// [executor] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// 单次 Executor 调用的最大 pass 数
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,
    /// 整个运行期间所有 Executor 调用累计的 pass 上限
    #[serde(default = "default_max_total_passes")]
    pub max_total_passes: u32,
    /// 第一遍是否附带截图
    #[serde(default = "default_include_screenshot")]
    pub include_screenshot: bool,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
            max_total_passes: default_max_total_passes(),
            include_screenshot: default_include_screenshot(),
        }
    }
}

fn default_max_passes() -> u32 {
    3
}

fn default_max_total_passes() -> u32 {
    150
}

fn default_include_screenshot() -> bool {
    true
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// 从 config 目录加载配置，环境变量 BEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.planner.max_iterations_dynamic, 50);
        assert_eq!(cfg.planner.max_iterations_predefined, 30);
        assert_eq!(cfg.planner.max_retries, 3);
        assert_eq!(cfg.planner.max_context_tokens, 128_000);
        assert!((cfg.planner.summarize_ratio - 0.7).abs() < f64::EPSILON);
        assert_eq!(cfg.executor.max_passes, 3);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.llm.provider, "deepseek");
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[planner]\nmax_iterations_dynamic = 7\n\n[executor]\nmax_passes = 2\n\n[llm]\nprovider = \"openai\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.planner.max_iterations_dynamic, 7);
        assert_eq!(cfg.planner.max_iterations_predefined, 30);
        assert_eq!(cfg.executor.max_passes, 2);
        assert_eq!(cfg.executor.max_total_passes, 150);
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.model, "deepseek-chat");
    }
}
