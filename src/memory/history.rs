//! 执行历史
//!
//! 每轮规划追加一条记录（Planner 输出 + 本轮工具调用摘要），追加后不再修改；
//! token 超出阈值时整体替换为一条 Summary，之后的记录从摘要之后重新累积。

use serde::{Deserialize, Serialize};

use crate::planning::PlannerOutput;

/// 压缩后的历史摘要，covered_through 为被覆盖的最后一轮
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub covered_through: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryRecord {
    Plan(PlannerOutput),
    Summary(Summary),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub record: HistoryRecord,
    pub tool_messages: Vec<String>,
    pub iteration_index: u32,
}

impl ExecutionHistoryEntry {
    pub fn plan(output: PlannerOutput, tool_messages: Vec<String>, iteration_index: u32) -> Self {
        Self {
            record: HistoryRecord::Plan(output),
            tool_messages,
            iteration_index,
        }
    }

    pub fn summary(summary: Summary) -> Self {
        Self {
            iteration_index: summary.covered_through,
            record: HistoryRecord::Summary(summary),
            tool_messages: Vec::new(),
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self.record, HistoryRecord::Summary(_))
    }

    /// prompt 中的文本形式
    pub fn to_prompt_text(&self) -> String {
        let mut s = match &self.record {
            HistoryRecord::Plan(output) => format!(
                "### Iteration {}\n{}",
                self.iteration_index,
                output.to_prompt_text()
            ),
            HistoryRecord::Summary(summary) => format!(
                "### Summary of iterations 1-{}\n{}\n",
                summary.covered_through, summary.summary
            ),
        };
        if !self.tool_messages.is_empty() {
            s.push_str("\n## Tool Results\n");
            for m in &self.tool_messages {
                s.push_str(&format!("- {}\n", m));
            }
        }
        s
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionHistory {
    entries: Vec<ExecutionHistoryEntry>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ExecutionHistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ExecutionHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_iteration(&self) -> u32 {
        self.entries.last().map(|e| e.iteration_index).unwrap_or(0)
    }

    /// 整体替换为一条摘要（不是追加）
    pub fn replace_with_summary(&mut self, summary: Summary) {
        self.entries = vec![ExecutionHistoryEntry::summary(summary)];
    }

    pub fn to_prompt_text(&self) -> String {
        self.entries
            .iter()
            .map(ExecutionHistoryEntry::to_prompt_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
