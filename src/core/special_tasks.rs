//! 特殊任务匹配：少量固定目标映射到预定义计划
//!
//! 大小写、首尾空白、连续空白以及 emoji 变体选择符（U+FE0F）都不影响匹配。

use crate::core::{Plan, PlanStep, Task};

struct SpecialTask {
    trigger: &'static str,
    canonical_task: &'static str,
    steps: &'static [(&'static str, &'static str)],
}

static SPECIAL_TASKS: &[SpecialTask] = &[SpecialTask {
    trigger: "read about our vision and upvote ❤️",
    canonical_task: "Read about our vision and upvote ❤️",
    steps: &[
        (
            "Open the project homepage and navigate to the \"Our Vision\" page",
            "The vision statement lives on its own page linked from the homepage",
        ),
        (
            "Read the vision statement and note its key points",
            "The user asked to read about the vision before voting",
        ),
        (
            "Click the ❤️ upvote button on the vision page and confirm the vote was registered",
            "Upvoting is the final action the user requested",
        ),
    ],
}];

/// 归一化：小写、压缩空白、去掉 U+FE0F
pub fn normalize_goal(goal: &str) -> String {
    goal.chars()
        .filter(|c| *c != '\u{FE0F}')
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 若目标命中特殊任务，返回规范任务文本 + 预定义计划
pub fn match_special_task(goal: &str) -> Option<Task> {
    let normalized = normalize_goal(goal);
    SPECIAL_TASKS
        .iter()
        .find(|t| normalize_goal(t.trigger) == normalized)
        .map(|t| {
            let steps = t
                .steps
                .iter()
                .map(|(action, reasoning)| PlanStep::new(*action, *reasoning))
                .collect();
            Task::with_plan(t.canonical_task, Plan::new(steps))
        })
}
