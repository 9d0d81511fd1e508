//! 预定义计划的 TODO 清单
//!
//! Markdown 复选框格式：`- [ ] 步骤` / `- [x] 步骤`，也接受 `*`、`+` 与 `1.` 前缀。

use std::fmt;

use serde::Serialize;

use crate::core::Plan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodoList {
    pub items: Vec<TodoItem>,
}

impl TodoList {
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            items: plan
                .steps
                .iter()
                .map(|s| TodoItem {
                    text: s.action.clone(),
                    done: false,
                })
                .collect(),
        }
    }

    /// 解析 markdown 清单；没有任何复选框行时返回 None
    pub fn parse_markdown(markdown: &str) -> Option<Self> {
        let items: Vec<TodoItem> = markdown.lines().filter_map(parse_item).collect();
        (!items.is_empty()).then_some(Self { items })
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|i| i.done).count()
    }

    pub fn all_done(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.done)
    }

    pub fn to_markdown(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TodoList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- [{}] {}", if item.done { "x" } else { " " }, item.text)?;
        }
        Ok(())
    }
}

fn parse_item(line: &str) -> Option<TodoItem> {
    let line = line.trim_start();
    let rest = if let Some(r) = line.strip_prefix(['-', '*', '+']) {
        r
    } else {
        let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        line[digits..].strip_prefix(['.', ')'])?
    };
    let rest = rest.trim_start().strip_prefix('[')?;
    let mut chars = rest.chars();
    let mark = chars.next()?;
    let rest = chars.as_str().strip_prefix(']')?;
    let done = match mark {
        'x' | 'X' | '✓' | '✔' => true,
        ' ' => false,
        _ => return None,
    };
    let text = rest.trim();
    (!text.is_empty()).then(|| TodoItem {
        text: text.to_string(),
        done,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlanStep;

    #[test]
    fn test_from_plan_and_render() {
        let plan = Plan::new(vec![PlanStep::new("open page", ""), PlanStep::new("upvote", "")]);
        let todo = TodoList::from_plan(&plan);
        assert_eq!(todo.to_markdown(), "- [ ] open page\n- [ ] upvote");
        assert!(!todo.all_done());
    }

    #[test]
    fn test_parse_markdown_variants() {
        let md = "Progress so far:\n- [x] open page\n* [X] read vision\n3. [ ] upvote\n- not a checkbox";
        let todo = TodoList::parse_markdown(md).unwrap();
        assert_eq!(todo.items.len(), 3);
        assert_eq!(todo.completed_count(), 2);
        assert_eq!(todo.items[2].text, "upvote");
    }

    #[test]
    fn test_parse_markdown_without_items() {
        assert!(TodoList::parse_markdown("nothing here").is_none());
        assert!(TodoList::parse_markdown("").is_none());
    }

    #[test]
    fn test_round_trip_markdown() {
        let md = "- [x] a\n- [ ] b";
        assert_eq!(TodoList::parse_markdown(md).unwrap().to_markdown(), md);
    }

    #[test]
    fn test_empty_list_is_not_done() {
        assert!(!TodoList::default().all_done());
    }
}
