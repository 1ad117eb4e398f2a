use serde::Serialize;
use serde_json::{json, Value};

use crate::diagnostic::INDEX_PLACEHOLDER;

/// The tools this server exposes. Everything that depends on the identity of a
/// tool (schema, single-index semantics, corrective examples) hangs off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ListIndices,
    GetMappings,
    SampleDocs,
    Search,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        Self::ListIndices,
        Self::GetMappings,
        Self::SampleDocs,
        Self::Search,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListIndices => "list_indices",
            Self::GetMappings => "get_mappings",
            Self::SampleDocs => "sample_docs",
            Self::Search => "search",
        }
    }

    /// Resolve a tool name the caller may have qualified with a server namespace.
    pub fn resolve(name: &str) -> Option<Self> {
        let bare = strip_namespace(name.trim());
        Self::ALL.into_iter().find(|kind| kind.as_str() == bare)
    }

    /// Tools whose calls must name exactly one concrete index.
    pub fn requires_single_index(self) -> bool {
        matches!(self, Self::GetMappings | Self::SampleDocs)
    }

    pub fn takes_index(self) -> bool {
        !matches!(self, Self::ListIndices)
    }

    /// A well-formed argument object for this tool, built around `index`. For
    /// `list_indices` the name is used as the pattern.
    pub fn example_arguments(self, index: Option<&str>) -> Value {
        let name = index.unwrap_or(INDEX_PLACEHOLDER);
        match self {
            Self::ListIndices => json!({ "index_pattern": index.unwrap_or("*") }),
            Self::GetMappings => json!({ "index": name }),
            Self::SampleDocs => json!({ "index": name, "size": 5 }),
            Self::Search => json!({
                "index": name,
                "query_body": { "query": { "match_all": {} } }
            }),
        }
    }
}

/// Drop a `server.`, `server/`, `server:` or `mcp__server__` prefix.
pub fn strip_namespace(name: &str) -> &str {
    let after_separator = name
        .rfind(['.', '/', ':'])
        .map(|pos| &name[pos + 1..])
        .unwrap_or(name);
    match after_separator.rfind("__") {
        Some(pos) => &after_separator[pos + 2..],
        None => after_separator,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    #[serde(skip)]
    pub kind: ToolKind,
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Immutable catalog answered to `tools/list`.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: ToolKind::ALL.into_iter().map(descriptor_for).collect(),
        }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        let kind = ToolKind::resolve(name)?;
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.kind == kind)
    }
}

fn descriptor_for(kind: ToolKind) -> ToolDescriptor {
    match kind {
        ToolKind::ListIndices => ToolDescriptor {
            kind,
            name: kind.as_str(),
            description: "List the indices available in the search backend. Call this first \
                          to discover valid index names before using any other tool.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "index_pattern": {
                        "type": "string",
                        "description": "Glob pattern matched against index names. `*` matches \
                                        any run of characters, `?` a single one; separate \
                                        alternatives with commas.",
                        "default": "*",
                        "examples": ["*", "veh*"]
                    }
                }
            }),
        },
        ToolKind::GetMappings => ToolDescriptor {
            kind,
            name: kind.as_str(),
            description: "Get the field mapping of ONE index. Pass exactly one index name per \
                          call; to inspect several indices, call this tool once per index and \
                          wait for each response before the next call.",
            input_schema: json!({
                "type": "object",
                "required": ["index"],
                "properties": {
                    "index": {
                        "type": "string",
                        "description": "A single index name as returned by list_indices.",
                        "examples": ["vehicles"]
                    }
                }
            }),
        },
        ToolKind::SampleDocs => ToolDescriptor {
            kind,
            name: kind.as_str(),
            description: "Fetch a few sample documents from ONE index to learn its data shape. \
                          Pass exactly one index name per call.",
            input_schema: json!({
                "type": "object",
                "required": ["index"],
                "properties": {
                    "index": {
                        "type": "string",
                        "description": "A single index name as returned by list_indices.",
                        "examples": ["people"]
                    },
                    "size": {
                        "type": "integer",
                        "description": "Number of documents to return.",
                        "default": 5,
                        "minimum": 1,
                        "maximum": 100,
                        "examples": [5]
                    }
                }
            }),
        },
        ToolKind::Search => ToolDescriptor {
            kind,
            name: kind.as_str(),
            description: "Run a query DSL request against an index. `query_body` must be a JSON \
                          object, not a string. Check field names with get_mappings first.",
            input_schema: json!({
                "type": "object",
                "required": ["index", "query_body"],
                "properties": {
                    "index": {
                        "type": "string",
                        "description": "Index name or pattern to search.",
                        "examples": ["vehicles"]
                    },
                    "query_body": {
                        "type": "object",
                        "description": "Query DSL request body.",
                        "examples": [
                            { "query": { "match": { "make": "Tesla" } } },
                            { "query": { "range": { "year": { "gte": 2020 } } }, "size": 10 }
                        ]
                    }
                }
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_tools_in_declaration_order() {
        let registry = ToolRegistry::new();
        let names: Vec<&str> = registry
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.name)
            .collect();
        assert_eq!(
            names,
            vec!["list_indices", "get_mappings", "sample_docs", "search"]
        );
    }

    #[test]
    fn descriptors_serialize_with_camel_case_schema_key() {
        let registry = ToolRegistry::new();
        let value = serde_json::to_value(registry.descriptors()).expect("descriptors serialize");
        assert_eq!(value[3]["name"], "search");
        assert_eq!(
            value[3]["inputSchema"]["required"],
            json!(["index", "query_body"])
        );
        assert_eq!(value[0]["inputSchema"]["properties"]["index_pattern"]["default"], "*");
    }

    #[test]
    fn resolve_strips_namespace_prefixes() {
        assert_eq!(ToolKind::resolve("search"), Some(ToolKind::Search));
        assert_eq!(ToolKind::resolve("elastic.search"), Some(ToolKind::Search));
        assert_eq!(ToolKind::resolve("elastic/get_mappings"), Some(ToolKind::GetMappings));
        assert_eq!(ToolKind::resolve("elastic:sample_docs"), Some(ToolKind::SampleDocs));
        assert_eq!(
            ToolKind::resolve("mcp__elastic-mcp__list_indices"),
            Some(ToolKind::ListIndices)
        );
        assert_eq!(ToolKind::resolve("delete_index"), None);
    }

    #[test]
    fn get_uses_namespace_resolution() {
        let registry = ToolRegistry::new();
        let descriptor = registry.get("elastic.sample_docs").expect("tool should resolve");
        assert_eq!(descriptor.name, "sample_docs");
        assert_eq!(descriptor.kind, ToolKind::SampleDocs);
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn single_index_semantics_only_for_mapping_and_samples() {
        assert!(ToolKind::GetMappings.requires_single_index());
        assert!(ToolKind::SampleDocs.requires_single_index());
        assert!(!ToolKind::Search.requires_single_index());
        assert!(!ToolKind::ListIndices.requires_single_index());
        assert!(!ToolKind::ListIndices.takes_index());
    }

    #[test]
    fn list_indices_example_uses_names_as_pattern() {
        assert_eq!(
            ToolKind::ListIndices.example_arguments(Some("vehicles,people")),
            json!({ "index_pattern": "vehicles,people" })
        );
        assert_eq!(
            ToolKind::ListIndices.example_arguments(None),
            json!({ "index_pattern": "*" })
        );
        assert_eq!(
            ToolKind::GetMappings.example_arguments(None),
            json!({ "index": "<index_name>" })
        );
    }
}
