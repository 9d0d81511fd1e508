//! 执行指标：工具调用数、错误数、观察数、执行 pass 数与起止时间
//!
//! 由 Orchestrator / Executor 更新，Planner 把它渲染进 prompt 做自我评估。

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 错误率告警阈值：error_rate > 30% 且错误数 > 3
const ERROR_RATE_WARNING: f64 = 0.3;
const ERROR_COUNT_WARNING: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionMetrics {
    pub tool_calls: u32,
    pub errors: u32,
    pub observations: u32,
    /// 所有 Executor 调用累计的 pass 数
    pub executor_passes: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            tool_calls: 0,
            errors: 0,
            observations: 0,
            executor_passes: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn record_tool_result(&mut self, is_error: bool) {
        self.tool_calls += 1;
        if is_error {
            self.errors += 1;
        } else {
            self.observations += 1;
        }
    }

    pub fn record_pass(&mut self) {
        self.executor_passes += 1;
    }

    pub fn finish(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.tool_calls == 0 {
            0.0
        } else {
            self.errors as f64 / self.tool_calls as f64
        }
    }

    pub fn elapsed_secs(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0)
    }

    pub fn high_error_rate(&self) -> bool {
        self.error_rate() > ERROR_RATE_WARNING && self.errors > ERROR_COUNT_WARNING
    }

    /// Planner prompt 中的 Execution Metrics 段落
    pub fn to_prompt_section(&self) -> String {
        let mut s = format!(
            "## Execution Metrics\n- Tool calls: {}\n- Errors: {} (error rate {:.0}%)\n- Observations: {}\n- Elapsed: {}s\n",
            self.tool_calls,
            self.errors,
            self.error_rate() * 100.0,
            self.observations,
            self.elapsed_secs()
        );
        if self.high_error_rate() {
            s.push_str(
                "- WARNING: many recent actions failed. Re-check the page state and try a different approach.\n",
            );
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate_and_warning_threshold() {
        let mut m = ExecutionMetrics::new();
        for _ in 0..3 {
            m.record_tool_result(true);
        }
        m.record_tool_result(false);
        // 75% 但只有 3 个错误，不告警
        assert!(!m.high_error_rate());
        assert!(!m.to_prompt_section().contains("WARNING"));

        m.record_tool_result(true);
        assert_eq!(m.tool_calls, 5);
        assert_eq!(m.errors, 4);
        assert!(m.high_error_rate());
        assert!(m.to_prompt_section().contains("WARNING"));
    }

    #[test]
    fn test_low_error_rate_never_warns() {
        let mut m = ExecutionMetrics::new();
        for _ in 0..20 {
            m.record_tool_result(false);
        }
        for _ in 0..5 {
            m.record_tool_result(true);
        }
        assert!(!m.high_error_rate());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut m = ExecutionMetrics::new();
        m.finish();
        let first = m.ended_at;
        m.finish();
        assert_eq!(first, m.ended_at);
    }
}
