//! Token 预算
//!
//! `TokenCounter` 是计数契约（具体分词器可替换）；`TokenEstimator` 是默认的字符启发式实现。
//! `TokenBudget` 判断 system prompt + 执行历史是否越过摘要阈值（默认 0.7 × max）。

use crate::llm::Message;

/// token 计数契约：纯函数、无状态
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// 每条消息额外计 4 个 token（role / 分隔符开销）
    fn count_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count(&m.content) + 4).sum()
    }
}

/// Token 估算器（简单的字符计数近似）
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenEstimator;

impl TokenEstimator {
    /// 英文约 4 字符/token，中文约 1.5 字符/token；空文本为 0
    pub fn estimate(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;
        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }
}

impl TokenCounter for TokenEstimator {
    fn count(&self, text: &str) -> usize {
        Self::estimate(text)
    }
}

/// 上下文 token 预算
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    max_tokens: usize,
    summarize_ratio: f64,
}

impl TokenBudget {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            summarize_ratio: 0.7,
        }
    }

    pub fn with_summarize_ratio(mut self, ratio: f64) -> Self {
        self.summarize_ratio = ratio;
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn threshold(&self) -> f64 {
        self.summarize_ratio * self.max_tokens as f64
    }

    /// system prompt + 历史是否严格超过阈值
    pub fn should_summarize(&self, system_tokens: usize, history_tokens: usize) -> bool {
        (system_tokens + history_tokens) as f64 > self.threshold()
    }

    /// 将文本截断到指定 token 数，保留开头部分
    pub fn truncate_to_tokens(counter: &dyn TokenCounter, text: &str, max_tokens: usize) -> String {
        let estimated = counter.count(text);
        if estimated <= max_tokens {
            return text.to_string();
        }

        let ratio = max_tokens as f64 / estimated as f64;
        let target_chars = (text.chars().count() as f64 * ratio * 0.9) as usize; // 留 10% 余量

        let truncated: String = text.chars().take(target_chars).collect();

        format!("{}...\n[truncated due to token budget]", truncated.trim_end())
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(128_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimator_english() {
        let text = "Hello, world! This is a test.";
        let tokens = TokenEstimator::estimate(text);
        assert!(tokens > 0);
        assert!(tokens < text.len());
        assert_eq!(TokenEstimator::estimate(""), 0);
    }

    #[test]
    fn test_token_estimator_chinese() {
        let tokens = TokenEstimator::estimate("你好世界，这是一个测试。");
        assert!(tokens >= 8);
    }

    #[test]
    fn test_threshold_is_strict() {
        let budget = TokenBudget::new(1000);
        assert!(!budget.should_summarize(400, 300));
        assert!(budget.should_summarize(400, 301));
        assert!(!budget.should_summarize(0, 0));
    }

    #[test]
    fn test_custom_ratio() {
        let budget = TokenBudget::new(1000).with_summarize_ratio(0.5);
        assert!(budget.should_summarize(300, 201));
        assert!(!budget.should_summarize(300, 200));
    }

    #[test]
    fn test_truncate_to_tokens() {
        let text = "word ".repeat(400);
        let out = TokenBudget::truncate_to_tokens(&TokenEstimator, &text, 50);
        assert!(out.ends_with("[truncated due to token budget]"));
        assert!(out.len() < text.len());
        assert_eq!(TokenBudget::truncate_to_tokens(&TokenEstimator, "short", 50), "short");
    }
}
