//! Keyword search over the node tree.
//!
//! The index is pluggable: anything implementing [`SearchBackend`] can answer
//! queries. [`WorkspaceStore`] ships a substring backend over node names,
//! paths and latest file content. [`SearchFacade`] wraps a backend, applies
//! configured limits, and enriches hits with the latest version summary and
//! a content snippet.

use quire_config::SearchConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::WorkspaceStore;
use crate::types::{Node, NodeKind};

/// A query handed to a [`SearchBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Keyword text; a literal substring matched with Unicode case folding.
    pub text: String,
    /// Only return nodes of this kind.
    #[serde(default)]
    pub kind: Option<NodeKind>,
    /// Only return nodes at or beneath this path.
    #[serde(default)]
    pub path_prefix: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: 20,
            ..Self::default()
        }
    }
}

/// One matching node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub node: Node,
    /// Latest version id; `None` for folders or unenriched hits.
    pub latest_version_id: Option<String>,
    /// Summary of the latest version.
    pub summary: Option<String>,
    /// Excerpt of the latest content around the first match.
    pub snippet: Option<String>,
}

impl SearchHit {
    pub fn bare(node: Node) -> Self {
        Self {
            node,
            latest_version_id: None,
            summary: None,
            snippet: None,
        }
    }
}

/// A page of hits plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<SearchHit>,
    pub total: usize,
}

/// Trait for search backends.
///
/// Implementations return hits ordered by relevance (or any stable order)
/// and the total number of matches ignoring `limit`/`offset`.
pub trait SearchBackend: Send + Sync {
    fn search(&self, tenant_id: &str, query: &SearchQuery) -> Result<SearchResults>;
}

/// Query surface used by callers.
pub struct SearchFacade<'a> {
    backend: &'a dyn SearchBackend,
    store: &'a WorkspaceStore,
    config: SearchConfig,
}

impl<'a> SearchFacade<'a> {
    pub fn new(backend: &'a dyn SearchBackend, store: &'a WorkspaceStore) -> Self {
        Self {
            backend,
            store,
            config: store.settings().search.clone(),
        }
    }

    /// Facade using the store's own substring backend.
    pub fn over_store(store: &'a WorkspaceStore) -> Self {
        Self::new(store, store)
    }

    /// Search with the configured default limit when `limit` is `None`.
    ///
    /// A blank query returns no results without calling the backend.
    pub fn search(
        &self,
        tenant_id: &str,
        text: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<SearchResults> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SearchResults::default());
        }
        self.run(
            tenant_id,
            SearchQuery {
                text: text.to_string(),
                limit: limit.unwrap_or(self.config.default_limit),
                offset: offset.unwrap_or(0),
                ..SearchQuery::default()
            },
        )
    }

    /// Search with a fully specified query. Limits are still clamped.
    pub fn run(&self, tenant_id: &str, mut query: SearchQuery) -> Result<SearchResults> {
        query.text = query.text.trim().to_string();
        if query.text.is_empty() {
            return Ok(SearchResults::default());
        }
        query.limit = query.limit.clamp(1, self.config.max_limit.max(1));

        let mut results = self.backend.search(tenant_id, &query)?;
        results.items.truncate(query.limit);
        for hit in &mut results.items {
            self.enrich(tenant_id, &query.text, hit);
        }

        debug!(tenant_id, query = %query.text, total = results.total, "Search complete");
        Ok(results)
    }

    fn enrich(&self, tenant_id: &str, text: &str, hit: &mut SearchHit) {
        if hit.node.kind != NodeKind::File || hit.latest_version_id.is_some() {
            return;
        }
        match self.store.read_file(tenant_id, &hit.node.id) {
            Ok(content) => {
                hit.snippet = Some(snippet(&content.version.content, text, self.config.snippet_chars));
                hit.summary = Some(content.version.summary);
                hit.latest_version_id = Some(content.version.id);
            }
            Err(e) => {
                warn!(tenant_id, node_id = %hit.node.id, error = %e, "Search hit enrichment failed");
            }
        }
    }
}

/// Up to `max_chars` characters of `content` centred on the first match.
fn snippet(content: &str, needle: &str, max_chars: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= max_chars {
        return content.trim().to_string();
    }

    let lowered: Vec<char> = content.chars().flat_map(char::to_lowercase).collect();
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    // Lowercasing can change the length; only trust the position when it didn't.
    let hit = if lowered.len() == chars.len() && !needle.is_empty() {
        lowered
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
            .unwrap_or(0)
    } else {
        0
    };

    let start = hit.saturating_sub(max_chars / 4).min(chars.len() - max_chars);
    let end = start + max_chars;
    let mut out: String = chars[start..end].iter().collect();
    out = out.trim().to_string();
    if start > 0 {
        out.insert_str(0, "...");
    }
    if end < chars.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewFile;
    use parking_lot::Mutex;

    struct FixedBackend {
        hits: Vec<Node>,
        total: usize,
        seen: Mutex<Vec<SearchQuery>>,
    }

    impl SearchBackend for FixedBackend {
        fn search(&self, _tenant_id: &str, query: &SearchQuery) -> Result<SearchResults> {
            self.seen.lock().push(query.clone());
            Ok(SearchResults {
                items: self.hits.iter().cloned().map(SearchHit::bare).collect(),
                total: self.total,
            })
        }
    }

    fn backend(hits: Vec<Node>, total: usize) -> FixedBackend {
        FixedBackend {
            hits,
            total,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_blank_query_skips_backend() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let mock = backend(Vec::new(), 0);
        let facade = SearchFacade::new(&mock, &store);

        let results = facade.search("t1", "   ", None, None).unwrap();
        assert_eq!(results, SearchResults::default());
        assert!(mock.seen.lock().is_empty());
    }

    #[test]
    fn test_limits_are_clamped() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let mock = backend(Vec::new(), 0);
        let facade = SearchFacade::new(&mock, &store);

        facade.search("t1", "x", None, None).unwrap();
        facade.search("t1", "x", Some(10_000), Some(5)).unwrap();
        facade.search("t1", "x", Some(0), None).unwrap();

        let seen = mock.seen.lock();
        assert_eq!(seen[0].limit, 20);
        assert_eq!(seen[1].limit, 100);
        assert_eq!(seen[1].offset, 5);
        assert_eq!(seen[2].limit, 1);
    }

    #[test]
    fn test_enrichment_failure_keeps_hit() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let real = store
            .create_file("t1", NewFile::new(None, "Plot", "the heist goes wrong"), "u")
            .unwrap();
        let mut ghost = real.node.clone();
        ghost.id = "missing".into();

        let mock = backend(vec![real.node.clone(), ghost], 2);
        let facade = SearchFacade::new(&mock, &store);
        let results = facade.search("t1", "heist", None, None).unwrap();

        assert_eq!(results.total, 2);
        assert_eq!(results.items.len(), 2);
        assert_eq!(results.items[0].summary.as_deref(), Some("Initial version"));
        assert_eq!(results.items[0].snippet.as_deref(), Some("the heist goes wrong"));
        assert_eq!(
            results.items[0].latest_version_id.as_deref(),
            Some(real.version.id.as_str())
        );
        assert!(results.items[1].summary.is_none());
        assert!(results.items[1].snippet.is_none());
    }

    #[test]
    fn test_snippet_centres_on_match() {
        let content = format!("{}needle{}", "a".repeat(100), "b".repeat(100));
        let s = snippet(&content, "NEEDLE", 40);
        assert!(s.contains("needle"));
        assert!(s.starts_with("..."));
        assert!(s.ends_with("..."));

        assert_eq!(snippet("short text", "zzz", 40), "short text");
        let head = snippet(&"x".repeat(100), "zzz", 10);
        assert_eq!(head, "xxxxxxxxxx...");
    }
}
