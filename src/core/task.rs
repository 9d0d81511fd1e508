//! 任务与预定义计划

use serde::{Deserialize, Serialize};

/// 结构化计划中的一步
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: String,
    #[serde(default)]
    pub reasoning: String,
}

impl PlanStep {
    pub fn new(action: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// `execute()` 的可选元数据
#[derive(Debug, Clone, Default)]
pub struct TaskMetadata {
    pub predefined_plan: Option<Plan>,
}

impl TaskMetadata {
    pub fn with_plan(plan: Plan) -> Self {
        Self {
            predefined_plan: Some(plan),
        }
    }
}

/// 自然语言目标；执行开始后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    text: String,
    predefined_plan: Option<Plan>,
}

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            predefined_plan: None,
        }
    }

    pub fn with_plan(text: impl Into<String>, plan: Plan) -> Self {
        Self {
            text: text.into(),
            predefined_plan: Some(plan),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn predefined_plan(&self) -> Option<&Plan> {
        self.predefined_plan.as_ref()
    }
}
