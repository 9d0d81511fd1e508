//! 执行历史摘要
//!
//! 先去掉冗余内容（TODO 清单、未完成标记、重复行），再请 LLM 压缩成一段摘要。

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{CompletionOptions, LlmClient, LlmError, Message};
use crate::memory::{ExecutionHistory, Summary, TokenBudget, TokenCounter};
use crate::planning::parser::{SECTION_COMPLETE, SECTION_TODO};

const SUMMARY_SYSTEM_PROMPT: &str = "You compress the execution history of a browser automation agent. \
Keep what was tried, what succeeded, what failed, facts discovered on pages, and what remains to be done. \
Drop repetition. Reply with a `## Summary` section only.";

/// 去掉序列化历史中的冗余段落与重复行
pub fn strip_redundant(history_text: &str) -> String {
    let todo_heading = format!("## {SECTION_TODO}");
    let complete_heading = format!("## {SECTION_COMPLETE}");
    let mut seen: HashSet<&str> = HashSet::new();
    let mut skipping = false;
    let mut out: Vec<&str> = Vec::new();

    for line in history_text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            skipping = trimmed.eq_ignore_ascii_case(&todo_heading)
                || trimmed.eq_ignore_ascii_case(&complete_heading);
            if skipping {
                continue;
            }
            out.push(line);
            continue;
        }
        if skipping {
            continue;
        }
        if trimmed.is_empty() {
            if out.last().map(|l| !l.trim().is_empty()).unwrap_or(false) {
                out.push("");
            }
            continue;
        }
        if seen.insert(trimmed) {
            out.push(line);
        }
    }
    out.join("\n").trim().to_string()
}

/// 取 `## Summary` 段落；没有标题时取全文
pub fn parse_summary(text: &str) -> String {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    match lower.find("## summary") {
        Some(pos) => trimmed[pos + "## summary".len()..]
            .trim_start_matches(':')
            .trim()
            .to_string(),
        None => trimmed.to_string(),
    }
}

pub struct HistorySummarizer {
    llm: Arc<dyn LlmClient>,
    counter: Arc<dyn TokenCounter>,
    /// 送去摘要的历史文本上限
    max_input_tokens: usize,
    retries: u32,
}

impl HistorySummarizer {
    pub fn new(llm: Arc<dyn LlmClient>, counter: Arc<dyn TokenCounter>, budget: &TokenBudget) -> Self {
        Self {
            llm,
            counter,
            max_input_tokens: budget.threshold() as usize,
            retries: 2,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub async fn summarize(
        &self,
        task: &str,
        history: &ExecutionHistory,
        options: &CompletionOptions,
    ) -> Result<Summary, AgentError> {
        let stripped = strip_redundant(&history.to_prompt_text());
        let stripped =
            TokenBudget::truncate_to_tokens(self.counter.as_ref(), &stripped, self.max_input_tokens);
        let messages = vec![
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(format!(
                "Task: {task}\n\nSummarize this execution history:\n\n{stripped}"
            )),
        ];
        let options = CompletionOptions {
            retries: self.retries,
            ..options.clone()
        };
        let response = self.llm.complete(&messages, &options).await?;
        let summary = parse_summary(&response.content);
        if summary.is_empty() {
            return Err(LlmError::InvalidResponse("empty history summary".to_string()).into());
        }
        tracing::info!(
            covered_through = history.last_iteration(),
            chars = summary.len(),
            "execution history summarized"
        );
        Ok(Summary {
            summary,
            covered_through: history.last_iteration(),
        })
    }
}
