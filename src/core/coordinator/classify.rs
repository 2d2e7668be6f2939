//! Query classification table.
//!
//! Maps query text to a backend by keyword membership. Routes are checked
//! in priority order and only routes whose backend is available for the
//! current call take part.

use crate::core::backends::BackendKind;

/// Default vocabulary that sends a query to the agent backend.
pub const DEFAULT_AGENT_VOCABULARY: &[&str] = &[
    "sop",
    "lld",
    "hld",
    "runbook",
    "procedure",
    "document",
    "design",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: BackendKind,
    /// Lowercased keywords; multi-word entries match as phrases.
    pub vocabulary: Vec<String>,
}

impl Route {
    pub fn new<I, S>(kind: BackendKind, vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kind,
            vocabulary: vocabulary
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    fn matches(&self, words: &[String], normalized: &str) -> bool {
        self.vocabulary.iter().any(|keyword| {
            if keyword.contains(' ') {
                normalized.contains(keyword.as_str())
            } else {
                words.iter().any(|w| w == keyword)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationTable {
    routes: Vec<Route>,
    default: BackendKind,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self::new(
            vec![Route::new(BackendKind::Agent, DEFAULT_AGENT_VOCABULARY)],
            BackendKind::KnowledgeBase,
        )
    }
}

impl ClassificationTable {
    pub fn new(routes: Vec<Route>, default: BackendKind) -> Self {
        Self { routes, default }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn default_backend(&self) -> BackendKind {
        self.default
    }

    /// Pick a backend for `query` among the `available` ones.
    ///
    /// First matching route wins. Without a match the default backend is
    /// used when available, otherwise the single available backend.
    pub fn classify(&self, query: &str, available: &[BackendKind]) -> Option<BackendKind> {
        let normalized = normalize(query);
        let words: Vec<String> = normalized.split(' ').map(str::to_string).collect();

        let matched = self
            .routes
            .iter()
            .filter(|route| available.contains(&route.kind))
            .find(|route| route.matches(&words, &normalized))
            .map(|route| route.kind);

        if matched.is_some() {
            return matched;
        }

        if available.contains(&self.default) {
            return Some(self.default);
        }

        match available {
            [only] => Some(*only),
            _ => available.first().copied(),
        }
    }
}

/// Lowercase and collapse every run of non-alphanumerics to one space.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: &[BackendKind] = &[BackendKind::KnowledgeBase, BackendKind::Agent];

    #[test]
    fn test_vocabulary_match_routes_to_agent() {
        let table = ClassificationTable::default();
        assert_eq!(
            table.classify("What is the backup SOP?", BOTH),
            Some(BackendKind::Agent)
        );
    }

    #[test]
    fn test_no_match_uses_default() {
        let table = ClassificationTable::default();
        assert_eq!(
            table.classify("How many users signed up?", BOTH),
            Some(BackendKind::KnowledgeBase)
        );
    }

    #[test]
    fn test_matches_whole_words_only() {
        let table = ClassificationTable::default();
        assert_eq!(
            table.classify("Explain the philosophy of caching", BOTH),
            Some(BackendKind::KnowledgeBase)
        );
    }

    #[test]
    fn test_unavailable_route_is_skipped() {
        let table = ClassificationTable::default();
        assert_eq!(
            table.classify("Show me the runbook", &[BackendKind::KnowledgeBase]),
            Some(BackendKind::KnowledgeBase)
        );
    }

    #[test]
    fn test_single_backend_is_fallback() {
        let table = ClassificationTable::default();
        assert_eq!(
            table.classify("anything at all", &[BackendKind::Agent]),
            Some(BackendKind::Agent)
        );
        assert_eq!(table.classify("anything at all", &[]), None);
    }

    #[test]
    fn test_phrase_keywords() {
        let table = ClassificationTable::new(
            vec![Route::new(BackendKind::Agent, ["incident review"])],
            BackendKind::KnowledgeBase,
        );
        assert_eq!(
            table.classify("Open the incident-review notes", BOTH),
            Some(BackendKind::Agent)
        );
    }
}
