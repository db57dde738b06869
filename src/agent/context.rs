//! Detection of customer-record lookups a query asks for.
//!
//! Queries mentioning email or ticket history, or containing an address,
//! trigger an email lookup; queries about orders or shipping, or containing
//! an order id, trigger an order lookup. The lookup term is the extracted
//! address or id, or the whole query when none is present.

use std::sync::LazyLock;

use regex::Regex;

use crate::mcp::params::tool_names;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.-]+@[\w.-]+").unwrap_or_else(|_| unreachable!()));

static ORDER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bORD-\d+").unwrap_or_else(|_| unreachable!()));

const EMAIL_KEYWORDS: &[&str] = &["email", "conversation", "ticket", "support history"];
const ORDER_KEYWORDS: &[&str] = &["order", "shipping", "delivery", "tracking", "ord-"];

/// Kind of customer record to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Support email history.
    Emails,
    /// Order records.
    Orders,
}

impl LookupKind {
    /// Tool serving this lookup.
    #[must_use]
    pub const fn tool_name(self) -> &'static str {
        match self {
            Self::Emails => tool_names::SEARCH_EMAILS,
            Self::Orders => tool_names::SEARCH_ORDERS,
        }
    }
}

/// One lookup to run before generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerLookup {
    /// Record kind.
    pub kind: LookupKind,
    /// Search term sent to the tool.
    pub term: String,
}

/// Returns the lookups `query` asks for, emails first.
#[must_use]
pub fn detect_lookups(query: &str) -> Vec<CustomerLookup> {
    let lowered = query.to_lowercase();
    let mut lookups = Vec::new();

    if query.contains('@') || EMAIL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        lookups.push(CustomerLookup {
            kind: LookupKind::Emails,
            term: extract_or_whole(&EMAIL_RE, query),
        });
    }
    if ORDER_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        lookups.push(CustomerLookup {
            kind: LookupKind::Orders,
            term: extract_or_whole(&ORDER_ID_RE, query),
        });
    }
    lookups
}

fn extract_or_whole(re: &Regex, query: &str) -> String {
    re.find(query)
        .map_or_else(|| query.trim().to_string(), |m| m.as_str().to_string())
}
