use serde_json::{json, Value};

use crate::diagnostic::Diagnostic;
use crate::registry::ToolKind;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Failures of a `tools/call`, each carrying enough context for the caller to
/// correct its next call without another round trip.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(Diagnostic),
    #[error("Unknown tool `{name}`. Available tools: {}.", .available.join(", "))]
    ToolNotFound {
        name: String,
        available: Vec<String>,
    },
    #[error("Index `{index}` not found. {}", available_hint(.available))]
    IndexNotFound {
        index: String,
        available: Option<Vec<String>>,
    },
    #[error("The search backend rejected the request on `{index}`: {root_cause}.{}", field_hint(.fields))]
    BadRequest {
        index: String,
        root_cause: String,
        fields: Vec<String>,
    },
    #[error("The search backend at {url} is unavailable: {message}. Retry once the backend is reachable.")]
    Unavailable { url: String, message: String },
    #[error("The search backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

fn available_hint(available: &Option<Vec<String>>) -> String {
    match available {
        Some(names) if names.is_empty() => {
            "Available indices: (none). Retry with one of these exact names.".to_string()
        }
        Some(names) => format!(
            "Available indices: {}. Retry with one of these exact names.",
            names.join(", ")
        ),
        None => "The available indices could not be listed. Call `list_indices` once the \
                 backend recovers to find the exact names."
            .to_string(),
    }
}

fn field_hint(fields: &[String]) -> String {
    if fields.is_empty() {
        String::new()
    } else {
        format!(
            " Fields available in this index: {}. Rewrite the query using only these field names.",
            fields.join(", ")
        )
    }
}

impl From<Diagnostic> for ToolError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::InvalidArguments(diagnostic)
    }
}

impl ToolError {
    pub fn unknown_tool(name: &str) -> Self {
        Self::ToolNotFound {
            name: name.to_string(),
            available: ToolKind::ALL
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::IndexNotFound { .. } => "index_not_found",
            Self::BadRequest { .. } => "bad_request",
            Self::Unavailable { .. } => "unavailable",
            Self::Backend { .. } => "backend_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidArguments(_) | Self::ToolNotFound { .. } | Self::IndexNotFound { .. } => {
                INVALID_PARAMS
            }
            _ => INTERNAL_ERROR,
        }
    }

    /// Structured context attached as the JSON-RPC error `data` member.
    pub fn data(&self) -> Value {
        match self {
            Self::InvalidArguments(diagnostic) => json!({
                "kind": self.kind(),
                "diagnostic": diagnostic.kind.as_str(),
                "tool": diagnostic.tool.as_str(),
                "indices": diagnostic.indices(),
            }),
            Self::ToolNotFound { name, available } => json!({
                "kind": self.kind(),
                "tool": name,
                "available_tools": available,
            }),
            Self::IndexNotFound { index, available } => json!({
                "kind": self.kind(),
                "index": index,
                "available_indices": available,
            }),
            Self::BadRequest {
                index,
                root_cause,
                fields,
            } => json!({
                "kind": self.kind(),
                "index": index,
                "status": 400,
                "root_cause": root_cause,
                "fields": fields,
            }),
            Self::Unavailable { url, message } => json!({
                "kind": self.kind(),
                "url": url,
                "message": message,
            }),
            Self::Backend { status, message } => json!({
                "kind": self.kind(),
                "status": status,
                "message": message,
            }),
            Self::Internal(message) => json!({
                "kind": self.kind(),
                "message": message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_not_found_lists_available_indices() {
        let err = ToolError::IndexNotFound {
            index: "nosuchindex".into(),
            available: Some(vec!["people".into(), "vehicles".into()]),
        };
        assert_eq!(
            err.to_string(),
            "Index `nosuchindex` not found. Available indices: people, vehicles. Retry with one of these exact names."
        );
        assert_eq!(err.code(), INVALID_PARAMS);
        assert_eq!(err.data()["available_indices"], json!(["people", "vehicles"]));
    }

    #[test]
    fn index_not_found_on_empty_cluster_says_none() {
        let err = ToolError::IndexNotFound {
            index: "x".into(),
            available: Some(vec![]),
        };
        assert!(err.to_string().contains("Available indices: (none)."));
    }

    #[test]
    fn index_not_found_without_listing_does_not_claim_empty_cluster() {
        let err = ToolError::IndexNotFound {
            index: "x".into(),
            available: None,
        };
        let message = err.to_string();
        assert!(!message.contains("(none)"));
        assert!(message.contains("could not be listed"));
        assert_eq!(err.data()["available_indices"], Value::Null);
    }

    #[test]
    fn bad_request_appends_field_names_when_known() {
        let err = ToolError::BadRequest {
            index: "vehicles".into(),
            root_cause: "query_shard_exception: failed to create query".into(),
            fields: vec!["make".into(), "year".into()],
        };
        let message = err.to_string();
        assert!(message.contains("failed to create query."));
        assert!(message.contains("Fields available in this index: make, year."));

        let bare = ToolError::BadRequest {
            index: "vehicles".into(),
            root_cause: "parsing_exception: unknown query [matc]".into(),
            fields: vec![],
        };
        assert!(!bare.to_string().contains("Fields available"));
    }

    #[test]
    fn argument_errors_map_to_invalid_params() {
        let diagnostic = Diagnostic::multiple_indices(
            ToolKind::GetMappings,
            vec!["vehicles".into(), "people".into()],
        );
        let err = ToolError::from(diagnostic);
        assert_eq!(err.code(), INVALID_PARAMS);
        assert_eq!(err.data()["diagnostic"], "multiple_indices");
        assert_eq!(err.data()["indices"], json!(["vehicles", "people"]));

        let unknown = ToolError::unknown_tool("drop_index");
        assert_eq!(unknown.code(), INVALID_PARAMS);
        assert_eq!(unknown.data()["available_tools"][3], "search");
    }
}
