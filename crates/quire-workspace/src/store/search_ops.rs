//! Substring search backend over live nodes.
//!
//! Matching uses `instr` over `fold()`ed text, so `%` and `_` are literal and
//! case folds cover non-ASCII letters.

use rusqlite::params;

use crate::error::Result;
use crate::search::{SearchBackend, SearchHit, SearchQuery, SearchResults};

use super::node_ops::{NODE_COLUMNS, normalize_path, row_to_node};
use super::WorkspaceStore;

/// Matches name, path or the latest version's content. `?1` tenant, `?2`
/// folded needle, `?3` kind filter, `?4` path prefix.
const MATCH_CLAUSE: &str = "FROM nodes n
     LEFT JOIN files f ON f.node_id = n.id
     LEFT JOIN versions v ON v.id = f.latest_version_id
     WHERE n.tenant_id = ?1 AND n.deleted_at IS NULL
       AND (?3 IS NULL OR n.kind = ?3)
       AND (?4 IS NULL OR n.path = ?4 OR substr(n.path, 1, length(?4) + 1) = ?4 || '/')
       AND (instr(fold(n.name), ?2) > 0
            OR instr(fold(n.path), ?2) > 0
            OR instr(fold(v.content), ?2) > 0)";

impl SearchBackend for WorkspaceStore {
    /// Name matches rank first, then path-only, then content-only.
    fn search(&self, tenant_id: &str, query: &SearchQuery) -> Result<SearchResults> {
        let needle = query.text.trim().to_lowercase();
        let kind = query.kind.map(|k| k.as_str());
        let prefix = query
            .path_prefix
            .as_deref()
            .map(normalize_path)
            .transpose()?;

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) {MATCH_CLAUSE}"),
                params![tenant_id, needle, kind, prefix],
                |row| row.get(0),
            )?;

            let columns = NODE_COLUMNS
                .split(", ")
                .map(|c| format!("n.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {columns} {MATCH_CLAUSE}
                 ORDER BY CASE
                     WHEN instr(fold(n.name), ?2) > 0 THEN 0
                     WHEN instr(fold(n.path), ?2) > 0 THEN 1
                     ELSE 2 END,
                   n.path
                 LIMIT ?5 OFFSET ?6"
            );
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(
                    params![
                        tenant_id,
                        needle,
                        kind,
                        prefix,
                        query.limit as i64,
                        query.offset as i64
                    ],
                    row_to_node,
                )?
                .map(|row| row.map(SearchHit::bare))
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(SearchResults {
                items,
                total: total as usize,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::search::{SearchBackend, SearchFacade, SearchQuery};
    use crate::store::WorkspaceStore;
    use crate::types::{NewFile, NodeKind, WriteContent};

    fn seeded() -> WorkspaceStore {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let notes = store.create_folder("t1", None, "Heist Notes", None, "u").unwrap();
        store
            .create_file("t1", NewFile::new(Some(notes.id.as_str()), "Crew", "the safecracker"), "u")
            .unwrap();
        let plan = store
            .create_file("t1", NewFile::new(None, "Plan", "enter through the roof"), "u")
            .unwrap();
        store
            .write_version(
                "t1",
                &plan.node.id,
                WriteContent::new("the vault is 100% secure", "rewrite"),
                None,
                "u",
            )
            .unwrap();
        store
            .create_file("t2", NewFile::new(None, "Heist", "other tenant"), "u")
            .unwrap();
        store
    }

    #[test]
    fn test_matches_name_path_and_latest_content() {
        let store = seeded();

        let results = store.search("t1", &SearchQuery::new("HEIST")).unwrap();
        let paths: Vec<_> = results.items.iter().map(|h| h.node.path.as_str()).collect();
        assert_eq!(results.total, 2);
        assert_eq!(paths, vec!["heist-notes", "heist-notes/crew"]);

        let results = store.search("t1", &SearchQuery::new("vault")).unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.items[0].node.name, "Plan");

        // Superseded content does not match.
        let results = store.search("t1", &SearchQuery::new("roof")).unwrap();
        assert_eq!(results.total, 0);
    }

    #[test]
    fn test_wildcards_are_literal() {
        let store = seeded();
        assert_eq!(store.search("t1", &SearchQuery::new("100%")).unwrap().total, 1);
        assert_eq!(store.search("t1", &SearchQuery::new("%")).unwrap().total, 1);
        assert_eq!(store.search("t1", &SearchQuery::new("_")).unwrap().total, 0);
    }

    #[test]
    fn test_case_fold_covers_non_ascii() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        store
            .create_file("t1", NewFile::new(None, "Café Menu", "ÉCLAIRS and tarts"), "u")
            .unwrap();

        let by_name = store.search("t1", &SearchQuery::new("CAFÉ")).unwrap();
        assert_eq!(by_name.total, 1);
        assert_eq!(by_name.items[0].node.path, "café-menu");

        let by_content = store.search("t1", &SearchQuery::new("éclairs")).unwrap();
        assert_eq!(by_content.total, 1);
    }

    #[test]
    fn test_filters_and_paging() {
        let store = seeded();
        let query = SearchQuery {
            kind: Some(NodeKind::File),
            ..SearchQuery::new("e")
        };
        let files = store.search("t1", &query).unwrap();
        assert!(files.items.iter().all(|h| h.node.kind == NodeKind::File));

        let query = SearchQuery {
            path_prefix: Some("Heist Notes".into()),
            ..SearchQuery::new("e")
        };
        let scoped = store.search("t1", &query).unwrap();
        assert!(scoped.items.iter().all(|h| h.node.path.starts_with("heist-notes")));

        let query = SearchQuery {
            limit: 1,
            offset: 1,
            ..SearchQuery::new("heist")
        };
        let page = store.search("t1", &query).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].node.path, "heist-notes/crew");
    }

    #[test]
    fn test_facade_over_store_enriches_files() {
        let store = seeded();
        let facade = SearchFacade::over_store(&store);
        let results = facade.search("t1", "vault", None, None).unwrap();
        assert_eq!(results.items[0].summary.as_deref(), Some("rewrite"));
        assert_eq!(
            results.items[0].snippet.as_deref(),
            Some("the vault is 100% secure")
        );
    }
}
