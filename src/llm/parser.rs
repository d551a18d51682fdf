//! Extraction of tool calls and reasoning sections from raw model text.
//!
//! Tool calls are looked for in three encodings, in priority order, and the
//! first encoding that yields at least one call wins:
//!
//! 1. fenced blocks tagged `tool_call`, `tool` or `json tool_call`
//! 2. inline `{"tool": ...}` objects anywhere in the text
//! 3. the whole trimmed text, when it starts with `{`
//!
//! Malformed fragments are skipped. Nothing in this module returns an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static FENCED_TOOL_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:json[ \t]+)?(?:tool_call|tool)[ \t]*\r?\n(.*?)```")
        .expect("Invalid fenced tool call regex")
});

static INLINE_TOOL_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"tool"\s*:"#).expect("Invalid inline tool call regex")
});

static LABELED_SECTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ism)^[ \t]*\**[ \t]*(?:thinking|思考)[ \t]*\**[ \t]*[:：][ \t]*\**(.*?)^[ \t]*\**[ \t]*(?:reply|answer|回复|回答)[ \t]*\**[ \t]*[:：][ \t]*\**(.*)\z",
    )
    .expect("Invalid labeled section regex")
});

static THINKING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think(?:ing)?>(.*?)</think(?:ing)?>").expect("Invalid thinking tag regex")
});

static STRAY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?think(?:ing)?>").expect("Invalid stray tag regex")
});

static SECTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*\**[ \t]*(?:thinking|reply|answer|思考|回复|回答)[ \t]*\**[ \t]*[:：][ \t]*\**[ \t]*",
    )
    .expect("Invalid section label regex")
});

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
}

/// Model output split into visible reasoning and the user-facing answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThinkingSplit {
    pub thinking: Option<String>,
    pub answer: String,
}

/// Extract tool calls from raw model output.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    let fenced: Vec<ToolCall> = FENCED_TOOL_CALL
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|inner| serde_json::from_str::<Value>(inner.as_str().trim()).ok())
        .filter_map(tool_call_from_value)
        .collect();
    if !fenced.is_empty() {
        return fenced;
    }

    let inline = parse_inline(text);
    if !inline.is_empty() {
        return inline;
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        if let Some(call) = serde_json::from_str::<Value>(trimmed)
            .ok()
            .and_then(tool_call_from_value)
        {
            return vec![call];
        }
    }

    Vec::new()
}

/// Scan for `{"tool": ...}` objects, parsing each one in place.
fn parse_inline(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut cursor = 0;

    while let Some(start) = INLINE_TOOL_START.find_at(text, cursor) {
        let fragment = &text[start.start()..];
        let mut stream = serde_json::Deserializer::from_str(fragment).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                cursor = start.start() + stream.byte_offset();
                if let Some(call) = tool_call_from_value(value) {
                    calls.push(call);
                }
            }
            // Malformed: move past this brace and keep looking.
            _ => cursor = start.start() + 1,
        }
    }

    calls
}

fn tool_call_from_value(value: Value) -> Option<ToolCall> {
    let Value::Object(mut object) = value else {
        return None;
    };

    let tool = match object.remove("tool")? {
        Value::String(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return None,
    };

    let args = match object.remove("args").or_else(|| object.remove("arguments")) {
        None | Some(Value::Null) => Value::Object(Default::default()),
        // Some models send arguments as an encoded JSON string.
        Some(Value::String(encoded)) => {
            serde_json::from_str(&encoded).unwrap_or(Value::String(encoded))
        }
        Some(other) => other,
    };

    Some(ToolCall { tool, args })
}

/// Split model output into a reasoning segment and an answer.
///
/// Tries `Thinking:` / `Reply:` labels first, then `<thinking>` or `<think>`
/// blocks. Without either, the whole text is the answer.
pub fn split_thinking_and_answer(text: &str) -> ThinkingSplit {
    if let Some(caps) = LABELED_SECTIONS.captures(text) {
        let thinking = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let answer = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return ThinkingSplit {
            thinking: non_empty(clean_section(thinking)),
            answer: clean_section(answer),
        };
    }

    let blocks: Vec<&str> = THINKING_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if THINKING_BLOCK.is_match(text) {
        let answer = THINKING_BLOCK.replace_all(text, "");
        return ThinkingSplit {
            thinking: non_empty(blocks.join("\n\n")),
            answer: clean_section(&answer),
        };
    }

    ThinkingSplit {
        thinking: None,
        answer: clean_section(text),
    }
}

/// Remove leftover labels and tags, then normalise blank lines.
fn clean_section(text: &str) -> String {
    let text = STRAY_TAG.replace_all(text, "");
    let text = SECTION_LABEL.replace_all(&text, "");
    let text = text.trim().trim_end_matches("**").trim();

    let mut cleaned = text.to_string();
    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }
    cleaned
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Locate a JSON object inside surrounding prose.
///
/// Prefers a fenced ```json block, otherwise takes the span from the first
/// `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}
