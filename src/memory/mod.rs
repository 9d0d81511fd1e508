//! 记忆层：执行历史、历史摘要与 token 预算

pub mod history;
pub mod summarizer;
pub mod token_budget;

pub use history::{ExecutionHistory, ExecutionHistoryEntry, HistoryRecord, Summary};
pub use summarizer::{strip_redundant, HistorySummarizer};
pub use token_budget::{TokenBudget, TokenCounter, TokenEstimator};
