//! One-line previews of tool invocations for the content log.
//!
//! Each known tool maps to the input field worth showing and how to shorten it.
//! Unknown tools, or known tools without that field, render as icon + name.

use serde_json::Value;

const DEFAULT_ICON: &str = "🔧";
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy)]
enum Shorten {
    /// Keep only the last path component.
    FileName,
    /// Keep at most this many characters.
    Chars(usize),
}

#[derive(Debug, Clone, Copy)]
struct PreviewRule {
    tool: &'static str,
    icon: &'static str,
    fields: &'static [&'static str],
    shorten: Shorten,
}

#[rustfmt::skip]
const RULES: &[PreviewRule] = &[
    PreviewRule { tool: "Read", icon: "📖", fields: &["file_path"], shorten: Shorten::FileName },
    PreviewRule { tool: "Edit", icon: "✏️", fields: &["file_path"], shorten: Shorten::FileName },
    PreviewRule { tool: "MultiEdit", icon: "✏️", fields: &["file_path"], shorten: Shorten::FileName },
    PreviewRule { tool: "Write", icon: "📝", fields: &["file_path"], shorten: Shorten::FileName },
    PreviewRule { tool: "NotebookEdit", icon: "📓", fields: &["notebook_path"], shorten: Shorten::FileName },
    PreviewRule { tool: "Grep", icon: "🔍", fields: &["pattern"], shorten: Shorten::Chars(30) },
    PreviewRule { tool: "Glob", icon: "🔍", fields: &["pattern"], shorten: Shorten::Chars(40) },
    PreviewRule { tool: "LS", icon: "📂", fields: &["path"], shorten: Shorten::Chars(40) },
    PreviewRule { tool: "Bash", icon: "🔨", fields: &["command"], shorten: Shorten::Chars(60) },
    PreviewRule { tool: "WebFetch", icon: "🌐", fields: &["url"], shorten: Shorten::Chars(40) },
    PreviewRule { tool: "WebSearch", icon: "🌐", fields: &["query"], shorten: Shorten::Chars(40) },
    PreviewRule { tool: "Task", icon: "🤖", fields: &["description"], shorten: Shorten::Chars(40) },
];

/// Upper bound for any preview detail, whatever the rule says.
pub const MAX_PREVIEW_CHARS: usize = 60;

fn rule_for(tool: &str) -> Option<&'static PreviewRule> {
    RULES.iter().find(|rule| rule.tool == tool)
}

/// Formats `<icon> <tool>: <detail>` or `<icon> <tool>` when no detail applies.
pub fn format_tool_preview(tool: &str, input: &Value) -> String {
    let Some(rule) = rule_for(tool) else {
        return format!("{} {}", DEFAULT_ICON, tool);
    };

    let detail = rule
        .fields
        .iter()
        .find_map(|field| input.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| match rule.shorten {
            Shorten::FileName => truncate_chars(file_name(value), MAX_PREVIEW_CHARS),
            Shorten::Chars(limit) => truncate_chars(value, limit.min(MAX_PREVIEW_CHARS)),
        });

    match detail {
        Some(detail) => format!("{} {}: {}", rule.icon, tool, detail),
        None => format!("{} {}", rule.icon, tool),
    }
}

fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
}

/// Cuts `value` to `max` characters (not bytes), marking the cut with `...`.
pub fn truncate_chars(value: &str, max: usize) -> String {
    let single_line: String = value
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    match single_line.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{}", &single_line[..cut], ELLIPSIS),
        None => single_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_tools_show_file_name() {
        let preview = format_tool_preview("Read", &json!({"file_path": "/a/b.txt"}));
        assert_eq!(preview, "📖 Read: b.txt");
    }

    #[test]
    fn test_bash_command_is_bounded() {
        let command = "x".repeat(500);
        let preview = format_tool_preview("Bash", &json!({ "command": command }));
        assert!(preview.starts_with("🔨 Bash: "));
        assert!(preview.ends_with("..."));
        let detail = preview.trim_start_matches("🔨 Bash: ");
        assert_eq!(detail.chars().count(), 60 + 3);
    }

    #[test]
    fn test_grep_pattern_limit() {
        let preview = format_tool_preview("Grep", &json!({"pattern": "a".repeat(31)}));
        assert_eq!(preview, format!("🔍 Grep: {}...", "a".repeat(30)));
    }

    #[test]
    fn test_unknown_tool_is_just_the_name() {
        assert_eq!(
            format_tool_preview("mcp__github__create_issue", &json!({"title": "x"})),
            "🔧 mcp__github__create_issue"
        );
    }

    #[test]
    fn test_known_tool_without_field() {
        assert_eq!(format_tool_preview("WebFetch", &json!({})), "🌐 WebFetch");
        assert_eq!(format_tool_preview("Read", &Value::Null), "📖 Read");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let value = "héllo wörld ✓✓✓";
        assert_eq!(truncate_chars(value, 5), "héllo...");
        assert_eq!(truncate_chars(value, 100), value);
        assert_eq!(truncate_chars("a\nb", 10), "a b");
    }
}
