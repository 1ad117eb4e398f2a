use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::registry::ToolKind;

pub type Arguments = Map<String, Value>;

static INDEX_VALUE: OnceLock<Regex> = OnceLock::new();
static ECHO_KEY: OnceLock<Regex> = OnceLock::new();

fn index_value_regex() -> &'static Regex {
    INDEX_VALUE.get_or_init(|| {
        Regex::new(r#""index"\s*:\s*"([^"]*)""#).expect("index pattern should compile")
    })
}

fn echo_key_regex() -> &'static Regex {
    ECHO_KEY.get_or_init(|| {
        Regex::new(r#""(?:content|text)"\s*:"#).expect("echo pattern should compile")
    })
}

pub fn normalize_arguments(raw: Option<&Value>, tool: ToolKind) -> Result<Arguments, Diagnostic> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(text)) => normalize_text(text, tool),
        Some(other) => Err(Diagnostic::new(
            tool,
            DiagnosticKind::NotAnObject {
                found: json_type_name(other),
            },
        )),
    }
}

/// Every `"index": "<name>"` value in order of appearance.
pub fn extract_indices(text: &str) -> Vec<String> {
    index_value_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|value| value.as_str().to_string())
        .collect()
}

fn has_index_key(text: &str) -> bool {
    text.contains("\"index\"")
}

fn has_echo_key(text: &str) -> bool {
    echo_key_regex().is_match(text)
}

fn normalize_text(text: &str, tool: ToolKind) -> Result<Arguments, Diagnostic> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    if !trimmed.starts_with('{') && (trimmed.contains('}') || has_index_key(trimmed)) {
        tracing::debug!(tool = tool.as_str(), "argument text has damaged framing");
        let indices = extract_indices(trimmed);
        if indices.len() >= 2 && tool.takes_index() {
            return Err(Diagnostic::multiple_indices(tool, indices));
        }
        return Err(Diagnostic::new(
            tool,
            DiagnosticKind::DamagedFraming {
                index: framing_index(indices, tool),
            },
        ));
    }

    if count(trimmed, '{') > 1 && count(trimmed, '}') > 1 {
        if let Some(end) = first_object_end(trimmed) {
            let remainder = trimmed[end..].trim();
            if !remainder.is_empty() {
                return Err(diagnose_trailing_text(trimmed, end, remainder, tool));
            }
        }
    }

    if has_echo_key(trimmed) {
        return Err(Diagnostic::new(tool, DiagnosticKind::EchoedResponse));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Diagnostic::new(
            tool,
            DiagnosticKind::NotAnObject {
                found: json_type_name(&other),
            },
        )),
        Err(err) => {
            let indices = extract_indices(trimmed);
            if indices.len() >= 2 && tool.takes_index() {
                return Err(Diagnostic::multiple_indices(tool, indices));
            }
            Err(Diagnostic::new(
                tool,
                DiagnosticKind::InvalidJson {
                    error: err.to_string(),
                },
            ))
        }
    }
}

/// `list_indices` has no `index` argument, so recovered names become one
/// comma-separated pattern instead.
fn framing_index(mut indices: Vec<String>, tool: ToolKind) -> Option<String> {
    if tool.takes_index() {
        indices.pop()
    } else if indices.is_empty() {
        None
    } else {
        Some(indices.join(","))
    }
}

fn diagnose_trailing_text(text: &str, end: usize, remainder: &str, tool: ToolKind) -> Diagnostic {
    if has_echo_key(remainder) {
        tracing::debug!(tool = tool.as_str(), "previous response echoed as arguments");
        return Diagnostic::new(tool, DiagnosticKind::EchoedResponse);
    }

    if has_index_key(remainder) && tool.requires_single_index() {
        let indices = extract_indices(text);
        if indices.len() >= 2 {
            tracing::debug!(tool = tool.as_str(), ?indices, "several indices in one call");
            return Diagnostic::multiple_indices(tool, indices);
        }
    }

    let first = &text[..end];
    Diagnostic::new(
        tool,
        DiagnosticKind::ConcatenatedObjects {
            first: compact_object(first).unwrap_or_else(|| first.to_string()),
            second: compact_object(remainder),
        },
    )
}

fn compact_object(text: &str) -> Option<String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Some(value.to_string()),
        _ => None,
    }
}

fn count(text: &str, needle: char) -> usize {
    text.chars().filter(|ch| *ch == needle).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    InString,
    Escaped,
}

/// Byte offset just past the brace that closes the first top-level object.
fn first_object_end(text: &str) -> Option<usize> {
    let mut state = ScanState::Scanning;
    let mut depth = 0usize;

    for (pos, ch) in text.char_indices() {
        state = match (state, ch) {
            (ScanState::Escaped, _) => ScanState::InString,
            (ScanState::InString, '\\') => ScanState::Escaped,
            (ScanState::InString, '"') => ScanState::Scanning,
            (ScanState::InString, _) => ScanState::InString,
            (ScanState::Scanning, '"') => ScanState::InString,
            (ScanState::Scanning, '{') => {
                depth += 1;
                ScanState::Scanning
            }
            (ScanState::Scanning, '}') => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos + ch.len_utf8());
                    }
                }
                ScanState::Scanning
            }
            (ScanState::Scanning, _) => ScanState::Scanning,
        };
    }

    None
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize_str(text: &str, tool: ToolKind) -> Result<Arguments, Diagnostic> {
        normalize_arguments(Some(&Value::String(text.to_string())), tool)
    }

    #[test]
    fn structured_arguments_pass_through_unchanged() {
        let raw = json!({
            "index": "vehicles",
            "query_body": { "query": { "match": { "text": "{not a brace problem}" } } }
        });
        let args = normalize_arguments(Some(&raw), ToolKind::Search).expect("object passes");
        assert_eq!(Value::Object(args), raw);
    }

    #[test]
    fn missing_or_null_arguments_become_empty_object() {
        assert!(normalize_arguments(None, ToolKind::ListIndices)
            .expect("absent arguments are empty")
            .is_empty());
        assert!(normalize_arguments(Some(&Value::Null), ToolKind::ListIndices)
            .expect("null arguments are empty")
            .is_empty());
        assert!(normalize_str("   ", ToolKind::ListIndices)
            .expect("blank text is empty")
            .is_empty());
    }

    #[test]
    fn non_object_values_are_type_mismatches() {
        let err = normalize_arguments(Some(&json!(["vehicles"])), ToolKind::GetMappings)
            .expect_err("array is rejected");
        assert_eq!(err.kind, DiagnosticKind::NotAnObject { found: "an array" });

        let err = normalize_str("42", ToolKind::GetMappings).expect_err("number text is rejected");
        assert_eq!(err.kind, DiagnosticKind::NotAnObject { found: "a number" });
    }

    #[test]
    fn valid_json_text_is_parsed() {
        let args = normalize_str(r#" {"index": "vehicles", "size": 3} "#, ToolKind::SampleDocs)
            .expect("valid text parses");
        assert_eq!(args["index"], "vehicles");
        assert_eq!(args["size"], 3);
    }

    #[test]
    fn concatenated_single_index_calls_yield_sequencing_diagnostic() {
        let err = normalize_str(r#"{"index":"vehicles"}{"index":"people"}"#, ToolKind::GetMappings)
            .expect_err("two objects are rejected");
        assert_eq!(
            err.kind,
            DiagnosticKind::MultipleIndices {
                indices: vec!["vehicles".into(), "people".into()]
            }
        );

        let message = err.to_string();
        assert!(message.contains("vehicles"));
        assert!(message.contains("people"));
        assert!(message.contains("wait for the response"));
        assert!(message.contains("Then call `get_mappings` again"));
    }

    #[test]
    fn concatenated_objects_for_search_give_two_call_example() {
        let text = r#"{"index":"vehicles","query_body":{}} {"index":"people","query_body":{}}"#;
        let err = normalize_str(text, ToolKind::Search).expect_err("two objects are rejected");
        assert_eq!(
            err.kind,
            DiagnosticKind::ConcatenatedObjects {
                first: r#"{"index":"vehicles","query_body":{}}"#.into(),
                second: Some(r#"{"index":"people","query_body":{}}"#.into()),
            }
        );
    }

    #[test]
    fn echoed_response_in_trailing_object_is_detected() {
        let text = r#"{"index":"vehicles"}{"content":[{"type":"text","text":"{}"}]}"#;
        let err = normalize_str(text, ToolKind::GetMappings).expect_err("echo is rejected");
        assert_eq!(err.kind, DiagnosticKind::EchoedResponse);
        assert!(err.to_string().contains("previous tool response"));
    }

    #[test]
    fn echoed_response_alone_is_detected_before_parsing() {
        let text = r#"{"content":[{"type":"text","text":"[]"}]}"#;
        let err = normalize_str(text, ToolKind::ListIndices).expect_err("echo is rejected");
        assert_eq!(err.kind, DiagnosticKind::EchoedResponse);
    }

    #[test]
    fn damaged_framing_with_several_indices_is_multi_index() {
        let text = r#""index": "vehicles"}, {"index": "people"}"#;
        let err = normalize_str(text, ToolKind::SampleDocs).expect_err("framing is damaged");
        assert_eq!(
            err.kind,
            DiagnosticKind::MultipleIndices {
                indices: vec!["vehicles".into(), "people".into()]
            }
        );
    }

    #[test]
    fn damaged_framing_with_one_index_suggests_single_object() {
        let err = normalize_str(r#""index": "vehicles"}"#, ToolKind::GetMappings)
            .expect_err("framing is damaged");
        assert_eq!(
            err.kind,
            DiagnosticKind::DamagedFraming {
                index: Some("vehicles".into())
            }
        );
        assert!(err
            .to_string()
            .contains(r#"Corrected example: call `get_mappings` with {"index":"vehicles"}"#));
    }

    #[test]
    fn damaged_framing_without_index_uses_placeholder() {
        let err = normalize_str("index_pattern: veh*}", ToolKind::ListIndices)
            .expect_err("framing is damaged");
        assert_eq!(err.kind, DiagnosticKind::DamagedFraming { index: None });
        assert!(err.to_string().contains(r#"{"index_pattern":"*"}"#));
    }

    #[test]
    fn damaged_list_indices_call_folds_names_into_one_pattern() {
        let err = normalize_str(r#""index":"a"},{"index":"b"}"#, ToolKind::ListIndices)
            .expect_err("framing is damaged");
        assert_eq!(
            err.kind,
            DiagnosticKind::DamagedFraming {
                index: Some("a,b".into())
            }
        );
        let message = err.to_string();
        assert!(message.contains(r#"call `list_indices` with {"index_pattern":"a,b"}"#));
        assert!(!message.contains("one index per call"));
        assert!(!message.contains("again"));
    }

    #[test]
    fn invalid_list_indices_json_is_not_multi_index() {
        let err = normalize_str(r#"{"index": "a", "index": "b""#, ToolKind::ListIndices)
            .expect_err("unterminated object is rejected");
        assert!(matches!(err.kind, DiagnosticKind::InvalidJson { .. }));
    }

    #[test]
    fn invalid_json_with_several_indices_is_multi_index() {
        let err = normalize_str(r#"{"index": "vehicles", "index": "people""#, ToolKind::GetMappings)
            .expect_err("unterminated object is rejected");
        assert!(matches!(err.kind, DiagnosticKind::MultipleIndices { .. }));
    }

    #[test]
    fn invalid_json_includes_parser_message() {
        let err = normalize_str(r#"{"index": vehicles}"#, ToolKind::GetMappings)
            .expect_err("bare word is rejected");
        match &err.kind {
            DiagnosticKind::InvalidJson { error } => assert!(error.contains("line 1")),
            other => panic!("unexpected diagnostic: {other:?}"),
        }
    }

    #[test]
    fn braces_inside_strings_do_not_split_objects() {
        let text = r#"{"index":"vehicles","query_body":{"query":{"match":{"model":"}{"}}}}"#;
        let args = normalize_str(text, ToolKind::Search).expect("quoted braces are data");
        assert_eq!(args["query_body"]["query"]["match"]["model"], "}{");
    }

    #[test]
    fn first_object_end_tracks_escapes() {
        let text = r#"{"a":"x\"}"}{"b":1}"#;
        let end = first_object_end(text).expect("first object closes");
        assert_eq!(&text[..end], r#"{"a":"x\"}"}"#);
        assert_eq!(first_object_end(r#"{"a":{"#), None);
    }

    #[test]
    fn extract_indices_preserves_order_of_appearance() {
        let indices = extract_indices(r#"{"index" : "people"} junk "index":"vehicles""#);
        assert_eq!(indices, vec!["people", "vehicles"]);
    }
}
