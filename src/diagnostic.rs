use std::fmt;

use serde_json::Value;

use crate::registry::ToolKind;

pub const INDEX_PLACEHOLDER: &str = "<index_name>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Text that looks like an argument object but is missing its framing.
    DamagedFraming { index: Option<String> },
    /// More than one index named where one is allowed.
    MultipleIndices { indices: Vec<String> },
    /// A previous tool response (`content`/`text`) was sent back as arguments.
    EchoedResponse,
    /// Several objects glued together in a single arguments value.
    ConcatenatedObjects { first: String, second: Option<String> },
    NotAnObject { found: &'static str },
    InvalidJson { error: String },
    MissingField { field: &'static str },
    WrongFieldType {
        field: &'static str,
        expected: &'static str,
    },
    InvalidIndexName { index: String },
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DamagedFraming { .. } => "damaged_framing",
            Self::MultipleIndices { .. } => "multiple_indices",
            Self::EchoedResponse => "echoed_response",
            Self::ConcatenatedObjects { .. } => "concatenated_objects",
            Self::NotAnObject { .. } => "not_an_object",
            Self::InvalidJson { .. } => "invalid_json",
            Self::MissingField { .. } => "missing_field",
            Self::WrongFieldType { .. } => "wrong_field_type",
            Self::InvalidIndexName { .. } => "invalid_index_name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub tool: ToolKind,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(tool: ToolKind, kind: DiagnosticKind) -> Self {
        Self { tool, kind }
    }

    pub fn multiple_indices(tool: ToolKind, indices: Vec<String>) -> Self {
        Self::new(tool, DiagnosticKind::MultipleIndices { indices })
    }

    /// Index names the diagnostic refers to, for structured error data.
    pub fn indices(&self) -> Vec<String> {
        match &self.kind {
            DiagnosticKind::MultipleIndices { indices } => indices.clone(),
            DiagnosticKind::DamagedFraming { index: Some(index) } => vec![index.clone()],
            _ => Vec::new(),
        }
    }

    fn tool_name(&self) -> &'static str {
        self.tool.as_str()
    }

    fn problem(&self) -> String {
        let tool = self.tool_name();
        match &self.kind {
            DiagnosticKind::DamagedFraming { .. } => format!(
                "The arguments for `{tool}` are not a well-formed JSON object: the opening brace \
                 or the surrounding quoting is damaged."
            ),
            DiagnosticKind::MultipleIndices { indices } => format!(
                "The arguments for `{tool}` name {} indices ({}), but `{tool}` accepts only one \
                 index per call.",
                indices.len(),
                indices.join(", ")
            ),
            DiagnosticKind::EchoedResponse => format!(
                "The arguments for `{tool}` contain a `content` or `text` key: a previous tool \
                 response was sent back as new arguments. Send only the argument object for the \
                 next call."
            ),
            DiagnosticKind::ConcatenatedObjects { .. } => format!(
                "The arguments for `{tool}` contain several JSON objects concatenated together. \
                 Each call takes a single argument object."
            ),
            DiagnosticKind::NotAnObject { found } => format!(
                "The arguments for `{tool}` must be a JSON object, but {found} was received."
            ),
            DiagnosticKind::InvalidJson { error } => {
                format!("The arguments for `{tool}` are not valid JSON: {error}.")
            }
            DiagnosticKind::MissingField { field } => {
                format!("`{tool}` requires a non-empty `{field}` argument.")
            }
            DiagnosticKind::WrongFieldType { field, expected } => {
                format!("The `{field}` argument of `{tool}` must be {expected}.")
            }
            DiagnosticKind::InvalidIndexName { index } => format!(
                "The `index` value `{index}` is not a single index name: it still contains JSON \
                 fragments such as braces or quotes."
            ),
        }
    }

    fn example(&self) -> Value {
        let index = match &self.kind {
            DiagnosticKind::MultipleIndices { indices } => indices.first().map(String::as_str),
            DiagnosticKind::DamagedFraming { index } => index.as_deref(),
            _ => None,
        };
        self.tool.example_arguments(index)
    }

    fn sequencing(&self) -> Option<String> {
        let tool = self.tool_name();
        match &self.kind {
            DiagnosticKind::MultipleIndices { indices } if indices.len() >= 2 => {
                let first = self.tool.example_arguments(Some(indices[0].as_str()));
                let second = self.tool.example_arguments(Some(indices[1].as_str()));
                let mut text = format!(
                    "Make one call per index, in sequence:\n\
                     1. Call `{tool}` with {first} and wait for the response.\n\
                     2. Then call `{tool}` again with {second}."
                );
                if indices.len() > 2 {
                    text.push_str(&format!(
                        "\nRepeat the same way, one call at a time, for: {}.",
                        indices[2..].join(", ")
                    ));
                }
                text.push_str("\nNever put more than one index or argument object in a single call.");
                Some(text)
            }
            DiagnosticKind::ConcatenatedObjects { first, second } => {
                let second = second
                    .clone()
                    .unwrap_or_else(|| self.tool.example_arguments(None).to_string());
                Some(format!(
                    "Split it into two calls:\n\
                     1. Call `{tool}` with {first} and wait for the response.\n\
                     2. Then call `{tool}` again with {second}."
                ))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n\nCorrected example: call `{}` with {}",
            self.problem(),
            self.tool_name(),
            self.example()
        )?;
        if let Some(sequencing) = self.sequencing() {
            write!(f, "\n\n{sequencing}")?;
        }
        Ok(())
    }
}
