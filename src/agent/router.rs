//! Binary routing between the classification and direct-RAG workflows.
//!
//! A query is a support query when it contains any category keyword
//! (case-insensitive substring, first match wins) or matches any
//! help-seeking pattern. There is no scoring and no threshold.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AgentError;

const SUPPORT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "security",
        &["password", "reset", "2fa", "authentication", "hacked", "compromised", "login"],
    ),
    (
        "device",
        &["device", "won't turn", "frozen", "screen", "factory reset", "broken", "power"],
    ),
    (
        "shipping",
        &["ship", "delivery", "track", "order", "arrive", "package"],
    ),
    (
        "returns",
        &["return", "refund", "warranty", "exchange", "money back"],
    ),
];

const SUPPORT_PATTERNS: &[&str] = &[
    r"how do i",
    r"how can i",
    r"what should i",
    r"can you help",
    r"i need help",
    r"my \w+ (is|isn't|won't)",
    r"problem with",
    r"issue with",
];

static BUILTIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SUPPORT_PATTERNS
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|_| unreachable!()))
        .collect()
});

/// Why a query was routed to the classification workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSignal {
    /// A category keyword occurred in the query.
    Keyword {
        /// Keyword group.
        category: String,
        /// Matching keyword.
        keyword: String,
    },
    /// A help-seeking pattern matched.
    Pattern {
        /// Pattern source.
        pattern: String,
    },
}

/// Routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Run the classification workflow.
    Support(RouteSignal),
    /// Run the direct-RAG workflow.
    Exploratory,
}

impl Route {
    /// Whether this is a support route.
    #[must_use]
    pub const fn is_support(&self) -> bool {
        matches!(self, Self::Support(_))
    }
}

/// Keyword and pattern based query router.
#[derive(Debug, Clone)]
pub struct QueryRouter {
    keywords: Vec<(String, Vec<String>)>,
    patterns: Vec<Regex>,
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self {
            keywords: SUPPORT_KEYWORDS
                .iter()
                .map(|(category, words)| {
                    (
                        (*category).to_string(),
                        words.iter().map(|w| (*w).to_string()).collect(),
                    )
                })
                .collect(),
            patterns: BUILTIN_PATTERNS.clone(),
        }
    }
}

impl QueryRouter {
    /// Adds keywords to a category, creating the category if needed.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, category: &str, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words = words.into_iter().map(|w| w.into().to_lowercase());
        if let Some((_, existing)) = self.keywords.iter_mut().find(|(c, _)| c == category) {
            existing.extend(words);
        } else {
            self.keywords.push((category.to_string(), words.collect()));
        }
        self
    }

    /// Adds a help-seeking pattern, matched against the lowercased query.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] for an invalid regex.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, AgentError> {
        let re = Regex::new(pattern).map_err(|e| AgentError::Config {
            message: format!("invalid routing pattern '{pattern}': {e}"),
        })?;
        self.patterns.push(re);
        Ok(self)
    }

    /// Routes `query`.
    #[must_use]
    pub fn route(&self, query: &str) -> Route {
        let lower = query.to_lowercase();

        for (category, words) in &self.keywords {
            if let Some(word) = words.iter().find(|w| lower.contains(w.as_str())) {
                return Route::Support(RouteSignal::Keyword {
                    category: category.clone(),
                    keyword: word.clone(),
                });
            }
        }

        self.patterns
            .iter()
            .find(|re| re.is_match(&lower))
            .map_or(Route::Exploratory, |re| {
                Route::Support(RouteSignal::Pattern {
                    pattern: re.as_str().to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("How do I reset my password?", true ; "password reset")]
    #[test_case("My device won't turn on", true ; "device")]
    #[test_case("What is your return policy?", true ; "returns")]
    #[test_case("Where is my PACKAGE", true ; "shipping upper case")]
    #[test_case("Tell me about OmniTech", false ; "company info")]
    #[test_case("What products do you sell?", false ; "catalog")]
    #[test_case("how can i pair headphones", true ; "help pattern")]
    #[test_case("my laptop is slow", true ; "my noun is")]
    #[test_case("There is an issue with billing", true ; "issue with")]
    #[test_case("", false ; "empty")]
    fn test_route(query: &str, support: bool) {
        assert_eq!(QueryRouter::default().route(query).is_support(), support);
    }

    #[test]
    fn test_first_keyword_category_wins() {
        // "reset" (security) is checked before "factory reset" (device).
        let route = QueryRouter::default().route("factory reset please");
        assert_eq!(
            route,
            Route::Support(RouteSignal::Keyword {
                category: "security".to_string(),
                keyword: "reset".to_string(),
            })
        );
    }

    #[test]
    fn test_pattern_signal() {
        let route = QueryRouter::default().route("Can you help me?");
        assert_eq!(
            route,
            Route::Support(RouteSignal::Pattern {
                pattern: "can you help".to_string(),
            })
        );
    }

    #[test]
    fn test_extensions() {
        let router = QueryRouter::default()
            .with_keywords("billing", ["Invoice"])
            .with_pattern(r"^why (did|does)")
            .unwrap_or_else(|_| unreachable!());
        assert!(router.route("Send me an invoice copy").is_support());
        assert!(router.route("why does this happen").is_support());
        assert!(QueryRouter::default().with_pattern("(").is_err());
    }
}
