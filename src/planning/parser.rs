//! Planner 输出解析
//!
//! LLM 的回复是自由文本，格式没有契约保证。解析顺序：
//! 1. 含可识别的分段标题（`## Reasoning`、`Proposed Actions:` 等）时按段切分，
//!    段落正文里的 JSON 片段原样保留；
//! 2. 没有分段时，若含 JSON 对象（```json 代码块或首个 `{` 到末个 `}`）且能解析，按字段取值；
//! 3. 都不满足时仍走分段切分，结果为空字段。
//!
//! 缺失字段一律取空值，不报错；`task_complete` 总能解析成 bool。

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

pub const SECTION_REASONING: &str = "Reasoning";
pub const SECTION_ACTIONS: &str = "Proposed Actions";
pub const SECTION_TODO: &str = "TODO";
pub const SECTION_COMPLETE: &str = "Task Complete";
pub const SECTION_FINAL: &str = "Final Answer";

/// 解析结果，五个语义字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlan {
    pub reasoning: String,
    pub proposed_actions: String,
    pub todo_markdown: String,
    pub task_complete: bool,
    pub final_answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Reasoning,
    Actions,
    Todo,
    Complete,
    Final,
    /// 未知标题：结束当前段落，内容丢弃
    Other,
}

/// 标题形式（`## xxx`）允许的别名
fn heading_field(name: &str) -> Field {
    match normalize_label(name).as_str() {
        "reasoning" | "thought" | "thoughts" | "thinking" | "analysis" => Field::Reasoning,
        "proposed actions" | "next actions" | "actions" | "next steps" | "next step" => {
            Field::Actions
        }
        "todo" | "todo list" | "checklist" | "progress" => Field::Todo,
        "task complete" | "complete" | "done" | "completed" | "status" => Field::Complete,
        "final answer" | "answer" | "final response" | "result" => Field::Final,
        _ => Field::Other,
    }
}

/// 行首标签形式（`Xxx: ...`）只认规范名，避免正文里的 "Done: ..." 被误判
fn label_field(name: &str) -> Option<Field> {
    match normalize_label(name).as_str() {
        "reasoning" => Some(Field::Reasoning),
        "proposed actions" | "next actions" => Some(Field::Actions),
        "todo" => Some(Field::Todo),
        "task complete" => Some(Field::Complete),
        "final answer" => Some(Field::Final),
        _ => None,
    }
}

fn normalize_label(name: &str) -> String {
    name.trim()
        .trim_matches(|c: char| c == '*' || c == ':' || c.is_whitespace())
        .to_lowercase()
        .replace(['_', '-'], " ")
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*#{1,6}\s*(.*?)\s*$").expect("valid heading regex")
    })
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\**([A-Za-z][A-Za-z _-]*?)\**\s*:\s*\**\s*(.*)$").expect("valid label regex")
    })
}

/// 宽松解析 `true / yes / done / complete` 等为 true，其余为 false
pub fn parse_bool(text: &str) -> bool {
    let first = text
        .split(|c: char| c.is_whitespace() || c == '.' || c == ',')
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    matches!(
        first.as_str(),
        "true" | "yes" | "y" | "done" | "complete" | "completed" | "1"
    )
}

/// JSON 形式的 Planner 输出（字段名兼容常见变体）
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawJsonPlan {
    #[serde(alias = "thought", alias = "observation")]
    reasoning: Option<Value>,
    #[serde(alias = "proposedActions", alias = "next_steps", alias = "actions")]
    proposed_actions: Option<Value>,
    #[serde(alias = "todoMarkdown", alias = "todo")]
    todo_markdown: Option<Value>,
    #[serde(alias = "taskComplete", alias = "done", alias = "completed")]
    task_complete: Option<Value>,
    #[serde(alias = "finalAnswer", alias = "final_response", alias = "answer")]
    final_answer: Option<Value>,
}

fn value_text(v: &Option<Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| match i {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

fn value_bool(v: &Option<Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => parse_bool(s),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json(text: &str) -> Option<ParsedPlan> {
    let json = extract_json(text)?;
    let raw: RawJsonPlan = serde_json::from_str(json).ok()?;
    let recognised = raw.reasoning.is_some()
        || raw.proposed_actions.is_some()
        || raw.task_complete.is_some()
        || raw.final_answer.is_some()
        || raw.todo_markdown.is_some();
    if !recognised {
        return None;
    }
    Some(ParsedPlan {
        reasoning: value_text(&raw.reasoning),
        proposed_actions: value_text(&raw.proposed_actions),
        todo_markdown: value_text(&raw.todo_markdown),
        task_complete: value_bool(&raw.task_complete),
        final_answer: value_text(&raw.final_answer),
    })
}

fn parse_sections(text: &str) -> ParsedPlan {
    let mut buckets: Vec<(Field, Vec<&str>)> = Vec::new();
    let mut current: Option<Field> = None;

    for line in text.lines() {
        if let Some(caps) = heading_re().captures(line) {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            // `## Task Complete: true` 形式：冒号后为同行内容
            let (name, inline) = match raw.split_once(':') {
                Some((name, rest)) => (name, rest.trim_matches(|c: char| c == '*' || c.is_whitespace())),
                None => (raw, ""),
            };
            let field = heading_field(name);
            current = Some(field);
            buckets.push((field, if inline.is_empty() { Vec::new() } else { vec![inline] }));
            continue;
        }
        if let Some(caps) = label_re().captures(line) {
            if let Some(field) = label_field(&caps[1]) {
                current = Some(field);
                let inline = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                buckets.push((field, if inline.trim().is_empty() { Vec::new() } else { vec![inline] }));
                continue;
            }
        }
        if current.is_some() {
            if let Some((_, lines)) = buckets.last_mut() {
                lines.push(line);
            }
        }
    }

    // 同一字段出现多次时取第一次
    let take = |field: Field| -> String {
        buckets
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, lines)| lines.join("\n").trim().to_string())
            .unwrap_or_default()
    };

    ParsedPlan {
        reasoning: take(Field::Reasoning),
        proposed_actions: take(Field::Actions),
        todo_markdown: take(Field::Todo),
        task_complete: parse_bool(&take(Field::Complete)),
        final_answer: take(Field::Final),
    }
}

/// 是否含有至少一个可识别的分段标题或行首标签
fn has_sections(text: &str) -> bool {
    text.lines().any(|line| {
        if let Some(caps) = heading_re().captures(line) {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let name = raw.split_once(':').map(|(n, _)| n).unwrap_or(raw);
            return heading_field(name) != Field::Other;
        }
        label_re()
            .captures(line)
            .and_then(|caps| label_field(&caps[1]))
            .is_some()
    })
}

/// 解析 Planner 的自由文本回复
pub fn parse_planner_output(text: &str) -> ParsedPlan {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedPlan::default();
    }
    if has_sections(trimmed) {
        return parse_sections(trimmed);
    }
    parse_json(trimmed).unwrap_or_else(|| parse_sections(trimmed))
}

/// 渲染成与解析器对应的分段文本（执行历史 / prompt 示例共用）
pub fn render_sections(plan: &ParsedPlan, include_todo: bool) -> String {
    let mut s = format!(
        "## {SECTION_REASONING}\n{}\n\n## {SECTION_ACTIONS}\n{}\n\n",
        plan.reasoning, plan.proposed_actions
    );
    if include_todo {
        s.push_str(&format!("## {SECTION_TODO}\n{}\n\n", plan.todo_markdown));
    }
    s.push_str(&format!("## {SECTION_COMPLETE}\n{}\n", plan.task_complete));
    if !plan.final_answer.is_empty() {
        s.push_str(&format!("\n## {SECTION_FINAL}\n{}\n", plan.final_answer));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markdown_sections() {
        let text = "## Reasoning\nThe search box is visible.\n\n## Proposed Actions\n1. Type 'rust' into the search box\n2. Press enter\n\n## Task Complete\nfalse\n";
        let plan = parse_planner_output(text);
        assert_eq!(plan.reasoning, "The search box is visible.");
        assert!(plan.proposed_actions.starts_with("1. Type 'rust'"));
        assert!(plan.proposed_actions.ends_with("2. Press enter"));
        assert!(!plan.task_complete);
        assert!(plan.final_answer.is_empty());
    }

    #[test]
    fn test_parse_inline_labels() {
        let text = "Reasoning: user wants the price\nProposed actions: read the price tag\nTask complete: no\nFinal answer:";
        let plan = parse_planner_output(text);
        assert_eq!(plan.reasoning, "user wants the price");
        assert_eq!(plan.proposed_actions, "read the price tag");
        assert!(!plan.task_complete);
    }

    #[test]
    fn test_done_inside_actions_is_not_a_label() {
        let text = "## Proposed Actions\nDone: click the submit button\n## Task Complete\nfalse";
        let plan = parse_planner_output(text);
        assert_eq!(plan.proposed_actions, "Done: click the submit button");
        assert!(!plan.task_complete);
    }

    #[test]
    fn test_parse_json_block() {
        let text = "Here you go:\n```json\n{\"reasoning\": \"all set\", \"done\": \"yes\", \"final_answer\": \"42\", \"next_steps\": []}\n```";
        let plan = parse_planner_output(text);
        assert_eq!(plan.reasoning, "all set");
        assert!(plan.task_complete);
        assert_eq!(plan.final_answer, "42");
        assert!(plan.proposed_actions.is_empty());
    }

    #[test]
    fn test_json_action_list_joined_by_lines() {
        let text = r#"{"reasoning": "r", "proposed_actions": ["open page", "scroll"], "task_complete": false}"#;
        let plan = parse_planner_output(text);
        assert_eq!(plan.proposed_actions, "open page\nscroll");
    }

    #[test]
    fn test_unrelated_json_falls_back_to_sections() {
        let text = "## Reasoning\nsaw {\"a\": 1} on the page\n## Proposed Actions\nclick";
        let plan = parse_planner_output(text);
        assert_eq!(plan.reasoning, "saw {\"a\": 1} on the page");
        assert_eq!(plan.proposed_actions, "click");
    }

    #[test]
    fn test_json_inside_sections_keeps_section_fields() {
        let text = "## Reasoning\nThe quiz form is open.\n\n## Proposed Actions\n1. fill the form with {\"answer\": \"42\"}\n2. click submit\n\n## Task Complete\nfalse";
        let plan = parse_planner_output(text);
        assert_eq!(plan.reasoning, "The quiz form is open.");
        assert!(plan.proposed_actions.contains("{\"answer\": \"42\"}"));
        assert!(plan.proposed_actions.ends_with("2. click submit"));
        assert!(plan.final_answer.is_empty());

        let text = "## Reasoning\nSettings page.\n\n## Proposed Actions\n1. send {\"done\": true} to the form\n\n## Task Complete\nfalse";
        let plan = parse_planner_output(text);
        assert!(!plan.task_complete);
        assert_eq!(plan.proposed_actions, "1. send {\"done\": true} to the form");
    }

    #[test]
    fn test_missing_fields_default_empty() {
        let plan = parse_planner_output("I am not sure what to do.");
        assert_eq!(plan, ParsedPlan::default());
        assert_eq!(parse_planner_output("   "), ParsedPlan::default());
    }

    #[test]
    fn test_heading_with_inline_value() {
        let plan = parse_planner_output("## Reasoning\nall items checked\n## Task Complete: true\n## Final Answer\nUpvoted.");
        assert!(plan.task_complete);
        assert_eq!(plan.final_answer, "Upvoted.");
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("True"));
        assert!(parse_bool("**yes**, finished"));
        assert!(parse_bool("done."));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("not yet"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_render_then_parse_preserves_fields() {
        let plan = ParsedPlan {
            reasoning: "Logged in; cart has 2 items.".into(),
            proposed_actions: "- open cart\n- click checkout".into(),
            todo_markdown: "- [x] log in\n- [ ] checkout".into(),
            task_complete: false,
            final_answer: String::new(),
        };
        let parsed = parse_planner_output(&render_sections(&plan, true));
        assert_eq!(parsed, plan);
    }
}
