//! Argument and payload shapes for the knowledge server's tools.
//!
//! Arguments serialize into the JSON object sent as MCP tool arguments;
//! payloads deserialize leniently from whatever the server returns, with
//! defaults for every missing field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool names consumed by the orchestrator.
pub mod tool_names {
    /// Classifies a support query into a category.
    pub const CLASSIFY_QUERY: &str = "classify_query";
    /// Looks up the prompt template for a category.
    pub const GET_QUERY_TEMPLATE: &str = "get_query_template";
    /// Retrieves category-scoped knowledge.
    pub const GET_KNOWLEDGE_FOR_QUERY: &str = "get_knowledge_for_query";
    /// Searches the whole knowledge base.
    pub const SEARCH_KNOWLEDGE: &str = "search_knowledge";
    /// Searches the customer's support email history.
    pub const SEARCH_EMAILS: &str = "search_emails";
    /// Looks up the customer's orders.
    pub const SEARCH_ORDERS: &str = "search_orders";
}

fn to_arguments<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Arguments for `classify_query`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyParams<'a> {
    /// Customer query.
    pub query: &'a str,
}

/// Arguments for `get_query_template`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateParams<'a> {
    /// Category whose template is wanted.
    pub query_name: &'a str,
}

/// Arguments for `get_knowledge_for_query`.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeParams<'a> {
    /// Category scope, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    /// Customer query.
    pub query: &'a str,
    /// Maximum documents to return.
    pub max_results: usize,
}

/// Arguments for `search_knowledge`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchParams<'a> {
    /// Search text.
    pub query: &'a str,
    /// Maximum matches to return.
    pub max_results: usize,
}

/// Arguments for `search_emails` and `search_orders`.
#[derive(Debug, Clone, Serialize)]
pub struct LookupParams<'a> {
    /// Email address, order id, or the whole query.
    pub query: &'a str,
}

macro_rules! impl_into_arguments {
    ($($ty:ident),+) => {
        $(
            impl $ty<'_> {
                /// Serializes into an MCP arguments object.
                #[must_use]
                pub fn into_arguments(self) -> Map<String, Value> {
                    to_arguments(&self)
                }
            }
        )+
    };
}

impl_into_arguments!(
    ClassifyParams,
    TemplateParams,
    KnowledgeParams,
    SearchParams,
    LookupParams
);

fn default_category() -> String {
    "general_inquiry".to_string()
}

/// Response of `classify_query`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassificationPayload {
    /// Category; older servers call this field `suggested_query`.
    #[serde(default = "default_category", alias = "suggested_query")]
    pub category: String,
    /// Classifier confidence.
    #[serde(default)]
    pub confidence: f64,
}

/// Response of `get_query_template`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TemplatePayload {
    /// Prompt template with `{query}` / `{knowledge}` placeholders.
    #[serde(default)]
    pub template: String,
    /// Human-readable category description.
    #[serde(default)]
    pub description: Option<String>,
}

/// One retrieved document fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    /// Fragment text.
    #[serde(default)]
    pub content: String,
    /// Source document identifier.
    #[serde(default)]
    pub source: String,
}

/// Response of `get_knowledge_for_query`.
///
/// Servers return either pre-joined `knowledge` text or a list of `matches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KnowledgePayload {
    /// Joined knowledge text.
    #[serde(default)]
    pub knowledge: Option<String>,
    /// Individual matches.
    #[serde(default)]
    pub matches: Vec<KnowledgeMatch>,
    /// Source identifiers.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Response of `search_knowledge`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchPayload {
    /// Ranked matches.
    #[serde(default)]
    pub matches: Vec<KnowledgeMatch>,
}

/// Decodes a tool payload, treating any shape mismatch as `None`.
pub fn decode<T: for<'de> Deserialize<'de>>(value: &Value) -> Option<T> {
    T::deserialize(value).ok()
}
