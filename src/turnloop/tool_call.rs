//! Extraction of tool invocations embedded in assistant text.
//!
//! Models request tools by emitting a fenced block tagged `tool` whose body
//! is a JSON object naming the tool and its arguments:
//!
//! ````text
//! ```tool
//! {"name": "read_file", "args": {"path": "main.py"}}
//! ```
//! ````
//!
//! Extraction is strictly lexical. Blocks are found by scanning for fence
//! markers, then each body is parsed independently, so one malformed block
//! never hides the well-formed blocks around it.

use log::warn;
use serde::Deserialize;
use serde_json::Value;

const FENCE_OPEN: &str = "```tool";
const FENCE_CLOSE: &str = "```";

/// A parsed tool invocation request, in order of appearance.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub args: Value,
}

#[derive(Deserialize)]
struct RawCall {
    name: String,
    #[serde(default = "empty_object")]
    args: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Locate every complete `tool` fence in `text`.
///
/// Returns `(body_span, full_span)` pairs where `full_span` covers the fences
/// themselves. An opening fence with no closing fence is ignored entirely.
fn fence_spans(text: &str) -> Vec<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(FENCE_OPEN) {
        let open = cursor + rel;
        let body_start = match text[open + FENCE_OPEN.len()..].find('\n') {
            // The tag must be alone on its line; "```tooling" is not a fence.
            Some(nl) if text[open + FENCE_OPEN.len()..open + FENCE_OPEN.len() + nl]
                .trim()
                .is_empty() =>
            {
                open + FENCE_OPEN.len() + nl + 1
            }
            _ => {
                cursor = open + FENCE_OPEN.len();
                continue;
            }
        };
        match text[body_start..].find(FENCE_CLOSE) {
            Some(rel_close) => {
                let close = body_start + rel_close;
                let full_end = close + FENCE_CLOSE.len();
                spans.push((body_start..close, open..full_end));
                cursor = full_end;
            }
            // Unterminated block: the model was likely cut off mid-reply.
            None => break,
        }
    }
    spans
}

/// Parse every well-formed tool block in `text`, in order of appearance.
///
/// Blocks whose body is not a JSON object with a string `name` are skipped
/// with a warning; a missing `args` field defaults to an empty object.
pub fn extract_tool_calls(text: &str) -> Vec<ToolCallRequest> {
    let mut calls = Vec::new();
    for (body, _) in fence_spans(text) {
        let body = text[body].trim();
        match serde_json::from_str::<RawCall>(body) {
            Ok(raw) if raw.args.is_object() => {
                calls.push(ToolCallRequest {
                    name: raw.name,
                    args: raw.args,
                });
            }
            Ok(raw) => {
                warn!("ignoring tool block for {:?}: args is not an object", raw.name);
            }
            Err(e) => {
                warn!("ignoring malformed tool block: {}", e);
            }
        }
    }
    calls
}

/// Remove every complete tool block from `text`, leaving the prose.
///
/// Malformed blocks are removed too; they were addressed to the engine, not
/// the user. Runs of blank lines opened up by removal are collapsed.
pub fn strip_tool_blocks(text: &str) -> String {
    let spans = fence_spans(text);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (_, full) in spans {
        out.push_str(&text[cursor..full.start]);
        cursor = full.end;
    }
    out.push_str(&text[cursor..]);

    // Collapse the triple newlines left where a block sat on its own lines.
    let mut collapsed = String::with_capacity(out.len());
    let mut blank_run = 0;
    for line in out.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        collapsed.push_str(line);
        collapsed.push('\n');
    }
    collapsed.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_block_extracts() {
        let text = "Let me look.\n```tool\n{\"name\": \"read_file\", \"args\": {\"path\": \"main.py\"}}\n```\n";
        let calls = extract_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].args, json!({"path": "main.py"}));
    }

    #[test]
    fn multiple_blocks_keep_document_order() {
        let text = "```tool\n{\"name\": \"a\"}\n```\nthen\n```tool\n{\"name\": \"b\"}\n```";
        let names: Vec<_> = extract_tool_calls(text).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_args_defaults_to_empty_object() {
        let calls = extract_tool_calls("```tool\n{\"name\": \"git_status\"}\n```");
        assert_eq!(calls[0].args, json!({}));
    }

    #[test]
    fn malformed_json_is_skipped_without_hiding_neighbors() {
        let text = "```tool\n{not json\n```\n```tool\n{\"name\": \"ok\"}\n```";
        let calls = extract_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ok");
    }

    #[test]
    fn non_object_args_is_rejected() {
        let calls = extract_tool_calls("```tool\n{\"name\": \"x\", \"args\": [1,2]}\n```");
        assert!(calls.is_empty());
    }

    #[test]
    fn unterminated_block_is_ignored() {
        let text = "so far so good\n```tool\n{\"name\": \"read_file\"}";
        assert!(extract_tool_calls(text).is_empty());
    }

    #[test]
    fn plain_code_fences_are_not_tool_blocks() {
        let text = "```rust\nfn main() {}\n```\n```tooling\n{\"name\": \"x\"}\n```";
        assert!(extract_tool_calls(text).is_empty());
    }

    #[test]
    fn strip_removes_blocks_and_keeps_prose() {
        let text = "Reading the file now.\n\n```tool\n{\"name\": \"read_file\", \"args\": {}}\n```\n\nDone soon.";
        let stripped = strip_tool_blocks(text);
        assert_eq!(stripped, "Reading the file now.\n\nDone soon.");
    }

    #[test]
    fn strip_without_blocks_is_identity() {
        let text = "no tools here, just ```rust\ncode\n```";
        assert_eq!(strip_tool_blocks(text), text);
    }

    #[test]
    fn strip_removes_malformed_blocks_too() {
        let stripped = strip_tool_blocks("before\n```tool\n{broken\n```\nafter");
        assert_eq!(stripped, "before\n\nafter");
    }
}
