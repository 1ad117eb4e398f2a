use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{json, Value};

use crate::backend::{BackendError, SearchBackend};
use crate::config::{ServerConfig, MAX_SAMPLE_SIZE};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::ToolError;
use crate::normalize::Arguments;
use crate::registry::ToolKind;

/// Runs normalized tool calls against a [`SearchBackend`] and turns backend
/// failures into [`ToolError`]s the caller can act on.
pub struct ToolExecutor<B> {
    backend: B,
    default_sample_size: u64,
}

impl<B: SearchBackend> ToolExecutor<B> {
    pub fn new(backend: B, config: &ServerConfig) -> Self {
        Self {
            backend,
            default_sample_size: config.default_sample_size,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn execute(&self, tool_name: &str, args: &Arguments) -> Result<Value, ToolError> {
        let Some(tool) = ToolKind::resolve(tool_name) else {
            return Err(ToolError::unknown_tool(tool_name));
        };
        tracing::debug!(tool = tool.as_str(), "executing tool");

        match tool {
            ToolKind::ListIndices => self.list_indices(args),
            ToolKind::GetMappings => {
                let index = required_index(args, tool)?;
                self.ensure_index_exists(&index)?;
                self.backend
                    .get_mapping(&index)
                    .map_err(|err| self.classify(&index, err))
            }
            ToolKind::SampleDocs => {
                let index = required_index(args, tool)?;
                let size = self.sample_size(args, tool)?;
                self.ensure_index_exists(&index)?;
                let docs = self
                    .backend
                    .sample_docs(&index, size)
                    .map_err(|err| self.classify(&index, err))?;
                Ok(Value::Array(docs))
            }
            ToolKind::Search => {
                let index = required_index(args, tool)?;
                let body = query_body(args, tool)?;
                self.ensure_index_exists(&index)?;
                self.backend
                    .search(&index, body)
                    .map_err(|err| self.classify(&index, err))
            }
        }
    }

    fn list_indices(&self, args: &Arguments) -> Result<Value, ToolError> {
        let pattern = match args.get("index_pattern") {
            None | Some(Value::Null) => "*",
            Some(Value::String(pattern)) => pattern.as_str(),
            Some(_) => {
                return Err(Diagnostic::new(
                    ToolKind::ListIndices,
                    DiagnosticKind::WrongFieldType {
                        field: "index_pattern",
                        expected: "a glob pattern string such as \"veh*\"",
                    },
                )
                .into())
            }
        };

        let names = self.backend.list_indices().map_err(listing_failed)?;
        let indices = filter_indices(names, pattern)?;
        Ok(json!({ "indices": indices }))
    }

    fn sample_size(&self, args: &Arguments, tool: ToolKind) -> Result<u64, ToolError> {
        let invalid = || {
            ToolError::from(Diagnostic::new(
                tool,
                DiagnosticKind::WrongFieldType {
                    field: "size",
                    expected: "a positive integer",
                },
            ))
        };

        let size = match args.get("size") {
            None | Some(Value::Null) => return Ok(self.default_sample_size),
            Some(Value::Number(number)) => number.as_u64().ok_or_else(invalid)?,
            Some(Value::String(text)) => text.trim().parse::<u64>().map_err(|_| invalid())?,
            Some(_) => return Err(invalid()),
        };
        if size == 0 {
            return Err(invalid());
        }
        if size > MAX_SAMPLE_SIZE {
            tracing::debug!(size, max = MAX_SAMPLE_SIZE, "capping sample size");
        }
        Ok(size.min(MAX_SAMPLE_SIZE))
    }

    fn ensure_index_exists(&self, index: &str) -> Result<(), ToolError> {
        if index.contains(['*', '?']) {
            return Ok(());
        }
        match self.backend.index_exists(index) {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.index_not_found(index)),
            Err(err) => Err(self.classify(index, err)),
        }
    }

    fn classify(&self, index: &str, err: BackendError) -> ToolError {
        match err {
            BackendError::Status { status: 404, .. } => self.index_not_found(index),
            BackendError::Status { status: 400, body } => self.bad_request(index, &body),
            BackendError::Status { status, body } => ToolError::Backend {
                status,
                message: root_cause(&body),
            },
            BackendError::Unavailable { url, message } => ToolError::Unavailable { url, message },
            BackendError::Decode(message) => ToolError::Internal(message),
        }
    }

    fn index_not_found(&self, index: &str) -> ToolError {
        match self.backend.list_indices() {
            Ok(available) => ToolError::IndexNotFound {
                index: index.to_string(),
                available: Some(available),
            },
            Err(BackendError::Unavailable { url, message }) => {
                ToolError::Unavailable { url, message }
            }
            Err(err) => {
                tracing::warn!(%index, error = %err, "failed to list indices for not-found report");
                ToolError::IndexNotFound {
                    index: index.to_string(),
                    available: None,
                }
            }
        }
    }

    fn bad_request(&self, index: &str, body: &str) -> ToolError {
        let root_cause = root_cause(body);
        let fields = match self.backend.get_mapping(index) {
            Ok(mapping) => mapping_field_names(&mapping),
            Err(err) => {
                tracing::debug!(%index, error = %err, "mapping unavailable for bad request report");
                Vec::new()
            }
        };
        ToolError::BadRequest {
            index: index.to_string(),
            root_cause,
            fields,
        }
    }
}

/// Failures of the index listing itself name no index, so statuses are not
/// read as "index missing" or "bad query".
fn listing_failed(err: BackendError) -> ToolError {
    match err {
        BackendError::Status { status, body } => ToolError::Backend {
            status,
            message: root_cause(&body),
        },
        BackendError::Unavailable { url, message } => ToolError::Unavailable { url, message },
        BackendError::Decode(message) => ToolError::Internal(message),
    }
}

fn required_index(args: &Arguments, tool: ToolKind) -> Result<String, ToolError> {
    let missing = || ToolError::from(Diagnostic::new(tool, DiagnosticKind::MissingField { field: "index" }));

    let index = match args.get("index") {
        None | Some(Value::Null) => return Err(missing()),
        Some(Value::String(index)) => index.trim().to_string(),
        Some(Value::Array(items)) => {
            let mut names: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            if names.len() >= 2 {
                return Err(Diagnostic::multiple_indices(tool, names).into());
            }
            names.pop().ok_or_else(missing)?
        }
        Some(_) => {
            return Err(Diagnostic::new(
                tool,
                DiagnosticKind::WrongFieldType {
                    field: "index",
                    expected: "a single index name string",
                },
            )
            .into())
        }
    };

    if index.is_empty() {
        return Err(missing());
    }
    if index.contains(['{', '}', '"']) {
        return Err(Diagnostic::new(tool, DiagnosticKind::InvalidIndexName { index }).into());
    }
    if tool.requires_single_index() && index.contains(',') {
        let names: Vec<String> = index
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if names.len() >= 2 {
            return Err(Diagnostic::multiple_indices(tool, names).into());
        }
        return names.into_iter().next().ok_or_else(missing);
    }

    Ok(index)
}

fn query_body(args: &Arguments, tool: ToolKind) -> Result<&Value, ToolError> {
    match args.get("query_body") {
        None | Some(Value::Null) => Err(Diagnostic::new(
            tool,
            DiagnosticKind::MissingField {
                field: "query_body",
            },
        )
        .into()),
        Some(body @ Value::Object(_)) => Ok(body),
        Some(_) => Err(Diagnostic::new(
            tool,
            DiagnosticKind::WrongFieldType {
                field: "query_body",
                expected: "a JSON object, not a string or other value",
            },
        )
        .into()),
    }
}

fn filter_indices(names: Vec<String>, pattern: &str) -> Result<Vec<String>, ToolError> {
    let pattern = pattern.trim();
    if pattern.is_empty() || pattern == "*" || pattern == "_all" {
        return Ok(names);
    }

    let globs = pattern
        .split(',')
        .map(str::trim)
        .filter(|glob| !glob.is_empty())
        .map(glob_to_regex)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ToolError::Internal(format!("invalid index_pattern `{pattern}`: {err}")))?;

    Ok(names
        .into_iter()
        .filter(|name| globs.iter().any(|glob| glob.is_match(name)))
        .collect())
}

fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(&ch.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

/// The backend's own explanation of a failed request, as `type: reason`.
fn root_cause(body: &str) -> String {
    let fallback = || {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "no details returned".to_string()
        } else {
            trimmed.to_string()
        }
    };

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };
    if let Some(cause) = value.pointer("/error/root_cause/0") {
        return describe_cause(cause);
    }
    match value.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(error @ Value::Object(_)) => describe_cause(error),
        _ => fallback(),
    }
}

fn describe_cause(cause: &Value) -> String {
    let kind = cause.get("type").and_then(Value::as_str);
    let reason = cause.get("reason").and_then(Value::as_str);
    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (None, Some(reason)) => reason.to_string(),
        (Some(kind), None) => kind.to_string(),
        (None, None) => cause.to_string(),
    }
}

/// Dotted field paths in a `GET /{index}/_mapping` document, including
/// sub-fields such as `make.keyword`.
pub fn mapping_field_names(mapping: &Value) -> Vec<String> {
    let mut fields = BTreeSet::new();
    if let Some(indices) = mapping.as_object() {
        for entry in indices.values() {
            if let Some(properties) = entry.pointer("/mappings/properties") {
                collect_fields("", properties, &mut fields);
            }
        }
    }
    fields.into_iter().collect()
}

fn collect_fields(prefix: &str, properties: &Value, out: &mut BTreeSet<String>) {
    let Some(properties) = properties.as_object() else {
        return;
    };
    for (name, field) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match field.get("properties") {
            Some(nested) => collect_fields(&path, nested, out),
            None => {
                out.insert(path.clone());
            }
        }
        if let Some(multi_fields) = field.get("fields") {
            collect_fields(&path, multi_fields, out);
        }
    }
}
