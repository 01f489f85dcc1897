//! Content versions: optimistic writes, history, diff, revert.

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::diff::{Diff, diff_lines};
use crate::error::{Result, ValidationError, WorkspaceError};
use crate::types::{
    FileContent, FileRecord, Node, NodeKind, ReviewStatus, Version, VersionSummary, WriteContent,
};
use crate::validation::{join_path, slug_for, validate_name};

use super::node_ops::{NodeDraft, find_node_at_path, insert_node, load_node, resolve_parent};
use super::{WorkspaceStore, fmt_ts, get_json, get_opt_ts, get_ts, now, parse_enum};

const VERSION_COLUMNS: &str = "id, file_id, tenant_id, content, summary, author_agent, \
     author_tool, metadata, created_by, created_at";

const FILE_COLUMNS: &str =
    "id, tenant_id, node_id, latest_version_id, category, review_status, approved_by, approved_at";

/// Result of [`WorkspaceStore::put_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutOutcome {
    /// Whether the file node was created by this call.
    pub created: bool,
    pub file: FileContent,
}

impl WorkspaceStore {
    /// Append a version to a file node.
    ///
    /// With `expected_version_id`, the write only happens if it still names
    /// the file's latest version; otherwise [`WorkspaceError::VersionConflict`]
    /// is returned and nothing changes.
    pub fn write_version(
        &self,
        tenant_id: &str,
        node_id: &str,
        content: WriteContent,
        expected_version_id: Option<&str>,
        actor: &str,
    ) -> Result<Version> {
        self.with_transaction(|conn| {
            let node = load_node(conn, tenant_id, node_id)?;
            let (_, version) =
                commit_version(conn, tenant_id, &node, content, expected_version_id, actor)?;
            Ok(version)
        })
    }

    /// Versions of a file, newest first.
    ///
    /// `limit` defaults to the configured default and is capped at the
    /// configured maximum.
    pub fn get_history(
        &self,
        tenant_id: &str,
        node_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<VersionSummary>> {
        let history = &self.settings().history;
        let limit = limit
            .unwrap_or(history.default_limit)
            .clamp(1, history.max_limit.max(1));

        self.with_conn(|conn| {
            let node = load_node(conn, tenant_id, node_id)?;
            if node.kind != NodeKind::File {
                return Err(ValidationError::NotAFile(node.id).into());
            }
            let Some(file) = find_file(conn, tenant_id, &node.id)? else {
                return Ok(Vec::new());
            };

            let sql = format!(
                "SELECT {VERSION_COLUMNS} FROM versions
                 WHERE tenant_id = ?1 AND file_id = ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let versions = stmt
                .query_map(params![tenant_id, file.id, limit as i64], row_to_version)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(versions.into_iter().map(VersionSummary::from_content).collect())
        })
    }

    /// Get a single version with its content.
    pub fn get_version(&self, tenant_id: &str, version_id: &str) -> Result<Version> {
        self.with_conn(|conn| Ok(load_version(conn, tenant_id, version_id)?.0))
    }

    /// Line diff between two versions of the same file.
    ///
    /// Argument order does not matter: the older version is the base.
    pub fn diff(&self, tenant_id: &str, version_a: &str, version_b: &str) -> Result<Diff> {
        let (a, a_seq, b, b_seq) = self.with_conn(|conn| {
            let (a, a_seq) = load_version(conn, tenant_id, version_a)?;
            let (b, b_seq) = load_version(conn, tenant_id, version_b)?;
            Ok((a, a_seq, b, b_seq))
        })?;

        if a.file_id != b.file_id {
            return Err(ValidationError::DiffAcrossFiles { a: a.id, b: b.id }.into());
        }

        let (base, target) = if (a.created_at, a_seq) <= (b.created_at, b_seq) {
            (a, b)
        } else {
            (b, a)
        };

        Ok(Diff {
            hunks: diff_lines(&base.content, &target.content),
            file_id: base.file_id,
            base_version_id: base.id,
            target_version_id: target.id,
        })
    }

    /// Restore old content by appending a copy of `target_version_id`.
    ///
    /// History is never rewritten; the returned version is new.
    pub fn revert(
        &self,
        tenant_id: &str,
        node_id: &str,
        target_version_id: &str,
        actor: &str,
    ) -> Result<Version> {
        let version = self.with_transaction(|conn| {
            let node = load_node(conn, tenant_id, node_id)?;
            let (target, _) = load_version(conn, tenant_id, target_version_id)?;
            let file = find_file(conn, tenant_id, &node.id)?;
            if file.as_ref().map(|f| f.id.as_str()) != Some(target.file_id.as_str()) {
                return Err(ValidationError::VersionNotOfNode {
                    version_id: target.id,
                    node_id: node.id,
                }
                .into());
            }

            let content = WriteContent::new(
                target.content,
                format!("Reverted to version {}", target.id),
            )
            .with_tool("revert")
            .with_metadata(serde_json::json!({ "reverted_from": target.id }));
            let (_, version) = commit_version(conn, tenant_id, &node, content, None, actor)?;
            Ok(version)
        })?;

        info!(tenant_id, node_id, target_version_id, version_id = %version.id, "Reverted file");
        Ok(version)
    }

    /// A file node with its file record and latest version.
    pub fn read_file(&self, tenant_id: &str, node_id: &str) -> Result<FileContent> {
        self.with_conn(|conn| {
            let node = load_node(conn, tenant_id, node_id)?;
            read_file_content(conn, tenant_id, node)
        })
    }

    /// Create a file, or replace its content, by parent and name.
    ///
    /// Replacing an existing file requires `if_match` to name its latest
    /// version: without it the call fails with
    /// [`WorkspaceError::PreconditionRequired`], and a stale value fails with
    /// [`WorkspaceError::VersionConflict`].
    pub fn put_file(
        &self,
        tenant_id: &str,
        parent_id: Option<&str>,
        name: &str,
        content: WriteContent,
        if_match: Option<&str>,
        actor: &str,
    ) -> Result<PutOutcome> {
        self.with_transaction(|conn| {
            let parent = resolve_parent(conn, tenant_id, parent_id)?;
            let name = validate_name(name)?;
            let path = join_path(parent.as_ref().map(|p| p.path.as_str()), &slug_for(name)?);

            match find_node_at_path(conn, tenant_id, &path)? {
                None => {
                    if let Some(expected) = if_match {
                        return Err(WorkspaceError::VersionConflict {
                            file_id: path,
                            expected: expected.to_string(),
                            actual: None,
                        });
                    }
                    let node =
                        insert_node(conn, tenant_id, NodeDraft::file(parent.as_ref(), name), actor)?;
                    let (file, version) = commit_version(conn, tenant_id, &node, content, None, actor)?;
                    Ok(PutOutcome {
                        created: true,
                        file: FileContent {
                            node,
                            file,
                            version,
                        },
                    })
                }
                Some(node) if node.kind != NodeKind::File => {
                    Err(ValidationError::NotAFile(node.id).into())
                }
                Some(node) => {
                    let Some(expected) = if_match else {
                        return Err(WorkspaceError::PreconditionRequired(format!(
                            "{path} exists; supply the latest version id to replace it"
                        )));
                    };
                    let (file, version) =
                        commit_version(conn, tenant_id, &node, content, Some(expected), actor)?;
                    Ok(PutOutcome {
                        created: false,
                        file: FileContent {
                            node,
                            file,
                            version,
                        },
                    })
                }
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction-level helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Insert a version for `node` and repoint the file's latest version.
///
/// Creates the file record on first write. A direct write clears any
/// previous review approval.
pub(crate) fn commit_version(
    conn: &Connection,
    tenant_id: &str,
    node: &Node,
    content: WriteContent,
    expected_version_id: Option<&str>,
    actor: &str,
) -> Result<(FileRecord, Version)> {
    if node.kind != NodeKind::File {
        return Err(ValidationError::NotAFile(node.id.clone()).into());
    }

    let mut file = match find_file(conn, tenant_id, &node.id)? {
        Some(file) => file,
        None => insert_file_record(conn, tenant_id, node)?,
    };

    if let Some(expected) = expected_version_id
        && file.latest_version_id.as_deref() != Some(expected)
    {
        return Err(WorkspaceError::VersionConflict {
            file_id: file.id,
            expected: expected.to_string(),
            actual: file.latest_version_id,
        });
    }

    let version = Version {
        id: Uuid::new_v4().to_string(),
        file_id: file.id.clone(),
        tenant_id: tenant_id.to_string(),
        content: content.content,
        summary: content.summary,
        author_agent: content.author_agent,
        author_tool: content.author_tool,
        metadata: content.metadata.unwrap_or_else(|| serde_json::json!({})),
        created_by: actor.to_string(),
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO versions (id, file_id, tenant_id, content, summary, author_agent,
            author_tool, metadata, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            version.id,
            version.file_id,
            version.tenant_id,
            version.content,
            version.summary,
            version.author_agent,
            version.author_tool,
            serde_json::to_string(&version.metadata)?,
            version.created_by,
            fmt_ts(&version.created_at),
        ],
    )?;

    conn.execute(
        "UPDATE files SET latest_version_id = ?2, review_status = 'none',
            approved_by = NULL, approved_at = NULL
         WHERE id = ?1",
        params![file.id, version.id],
    )?;
    file.latest_version_id = Some(version.id.clone());
    file.review_status = ReviewStatus::None;
    file.approved_by = None;
    file.approved_at = None;

    debug!(
        tenant_id,
        node_id = %node.id,
        file_id = %file.id,
        version_id = %version.id,
        "Committed version"
    );
    Ok((file, version))
}

/// Record a review approval on a file.
pub(crate) fn mark_approved(
    conn: &Connection,
    file: &mut FileRecord,
    approver: &str,
) -> Result<()> {
    let at = now();
    conn.execute(
        "UPDATE files SET review_status = 'approved', approved_by = ?2, approved_at = ?3
         WHERE id = ?1",
        params![file.id, approver, fmt_ts(&at)],
    )?;
    file.review_status = ReviewStatus::Approved;
    file.approved_by = Some(approver.to_string());
    file.approved_at = Some(at);
    Ok(())
}

pub(crate) fn find_file(
    conn: &Connection,
    tenant_id: &str,
    node_id: &str,
) -> Result<Option<FileRecord>> {
    let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE tenant_id = ?1 AND node_id = ?2");
    Ok(conn
        .query_row(&sql, params![tenant_id, node_id], row_to_file)
        .optional()?)
}

/// Node, file record and latest version for a live file node.
pub(crate) fn read_file_content(
    conn: &Connection,
    tenant_id: &str,
    node: Node,
) -> Result<FileContent> {
    if node.kind != NodeKind::File {
        return Err(ValidationError::NotAFile(node.id).into());
    }
    let file = find_file(conn, tenant_id, &node.id)?
        .ok_or_else(|| WorkspaceError::file_not_found(node.id.clone()))?;
    let latest = file
        .latest_version_id
        .as_deref()
        .ok_or_else(|| WorkspaceError::file_not_found(node.id.clone()))?;
    let (version, _) = load_version(conn, tenant_id, latest)?;
    Ok(FileContent {
        node,
        file,
        version,
    })
}

/// A version plus its insertion sequence, used to break timestamp ties.
fn load_version(conn: &Connection, tenant_id: &str, version_id: &str) -> Result<(Version, i64)> {
    let sql = format!(
        "SELECT {VERSION_COLUMNS}, rowid FROM versions WHERE tenant_id = ?1 AND id = ?2"
    );
    conn.query_row(&sql, params![tenant_id, version_id], |row| {
        Ok((row_to_version(row)?, row.get(10)?))
    })
    .optional()?
    .ok_or_else(|| WorkspaceError::version_not_found(version_id))
}

fn insert_file_record(conn: &Connection, tenant_id: &str, node: &Node) -> Result<FileRecord> {
    let file = FileRecord {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        node_id: node.id.clone(),
        latest_version_id: None,
        category: node.category.clone(),
        review_status: ReviewStatus::None,
        approved_by: None,
        approved_at: None,
    };
    conn.execute(
        "INSERT INTO files (id, tenant_id, node_id, category, review_status)
         VALUES (?1, ?2, ?3, ?4, 'none')",
        params![file.id, file.tenant_id, file.node_id, file.category],
    )?;
    Ok(file)
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<Version> {
    Ok(Version {
        id: row.get(0)?,
        file_id: row.get(1)?,
        tenant_id: row.get(2)?,
        content: row.get(3)?,
        summary: row.get(4)?,
        author_agent: row.get(5)?,
        author_tool: row.get(6)?,
        metadata: get_json(row, 7)?,
        created_by: row.get(8)?,
        created_at: get_ts(row, 9)?,
    })
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        node_id: row.get(2)?,
        latest_version_id: row.get(3)?,
        category: row.get(4)?,
        review_status: parse_enum(row, 5)?,
        approved_by: row.get(6)?,
        approved_at: get_opt_ts(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::HunkKind;
    use crate::types::NewFile;

    fn store_with_doc() -> (WorkspaceStore, FileContent) {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let doc = store
            .create_file("t1", NewFile::new(None, "doc", "v1"), "alice")
            .unwrap();
        (store, doc)
    }

    #[test]
    fn test_write_with_current_token() {
        let (store, doc) = store_with_doc();
        let v2 = store
            .write_version(
                "t1",
                &doc.node.id,
                WriteContent::new("v2", "second").with_agent("writer"),
                Some(&doc.version.id),
                "alice",
            )
            .unwrap();

        let read = store.read_file("t1", &doc.node.id).unwrap();
        assert_eq!(read.version.id, v2.id);
        assert_eq!(read.version.content, "v2");
        assert_eq!(read.version.author_agent.as_deref(), Some("writer"));
    }

    #[test]
    fn test_write_without_token_succeeds() {
        let (store, doc) = store_with_doc();
        store
            .write_version("t1", &doc.node.id, WriteContent::new("v2", "s"), None, "bob")
            .unwrap();
        assert_eq!(store.get_history("t1", &doc.node.id, None).unwrap().len(), 2);
    }

    #[test]
    fn test_stale_token_conflicts_without_write() {
        let (store, doc) = store_with_doc();
        let v2 = store
            .write_version("t1", &doc.node.id, WriteContent::new("v2", "s"), None, "a")
            .unwrap();

        let err = store
            .write_version(
                "t1",
                &doc.node.id,
                WriteContent::new("v3", "s"),
                Some(&doc.version.id),
                "b",
            )
            .unwrap_err();
        match err {
            WorkspaceError::VersionConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, doc.version.id);
                assert_eq!(actual.as_deref(), Some(v2.id.as_str()));
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let read = store.read_file("t1", &doc.node.id).unwrap();
        assert_eq!(read.version.id, v2.id);
        assert_eq!(store.get_history("t1", &doc.node.id, None).unwrap().len(), 2);
    }

    #[test]
    fn test_write_to_folder_rejected() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let folder = store.create_folder("t1", None, "Draft", None, "a").unwrap();
        let err = store
            .write_version("t1", &folder.id, WriteContent::new("x", "s"), None, "a")
            .unwrap_err();
        assert_eq!(err.code(), "not_a_file");
    }

    #[test]
    fn test_history_newest_first_with_counts() {
        let (store, doc) = store_with_doc();
        for (i, text) in ["two words", "now three words"].iter().enumerate() {
            store
                .write_version(
                    "t1",
                    &doc.node.id,
                    WriteContent::new(*text, format!("edit {i}")),
                    None,
                    "a",
                )
                .unwrap();
        }

        let history = store.get_history("t1", &doc.node.id, None).unwrap();
        let summaries: Vec<_> = history.iter().map(|h| h.summary.as_str()).collect();
        assert_eq!(summaries, vec!["edit 1", "edit 0", "Initial version"]);
        assert_eq!(history[0].word_count, 3);
        assert_eq!(history[0].char_count, 15);

        let limited = store.get_history("t1", &doc.node.id, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        let capped = store.get_history("t1", &doc.node.id, Some(10_000)).unwrap();
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn test_diff_is_order_independent() {
        let (store, doc) = store_with_doc();
        let v2 = store
            .write_version("t1", &doc.node.id, WriteContent::new("v2", "s"), None, "a")
            .unwrap();

        let forward = store.diff("t1", &doc.version.id, &v2.id).unwrap();
        let backward = store.diff("t1", &v2.id, &doc.version.id).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.base_version_id, doc.version.id);
        assert_eq!(forward.target_version_id, v2.id);
        assert_eq!(forward.hunks.len(), 1);
        assert_eq!(forward.hunks[0].kind, HunkKind::Replace);
    }

    #[test]
    fn test_diff_errors() {
        let (store, doc) = store_with_doc();
        let other = store
            .create_file("t1", NewFile::new(None, "other", "x"), "a")
            .unwrap();

        let err = store.diff("t1", &doc.version.id, "nope").unwrap_err();
        assert_eq!(err.code(), "version_not_found");

        let err = store.diff("t1", &doc.version.id, &other.version.id).unwrap_err();
        assert_eq!(err.code(), "diff_across_files");

        let err = store.diff("t2", &doc.version.id, &doc.version.id).unwrap_err();
        assert_eq!(err.code(), "version_not_found");
    }

    #[test]
    fn test_revert_rejects_foreign_version() {
        let (store, doc) = store_with_doc();
        let other = store
            .create_file("t1", NewFile::new(None, "other", "x"), "a")
            .unwrap();
        let err = store
            .revert("t1", &doc.node.id, &other.version.id, "a")
            .unwrap_err();
        assert_eq!(err.code(), "version_not_of_node");
    }

    #[test]
    fn test_edit_diff_revert_scenario() {
        let (store, doc) = store_with_doc();
        let v1 = doc.version.id.clone();

        let v2 = store
            .write_version("t1", &doc.node.id, WriteContent::new("v2", "second"), Some(&v1), "a")
            .unwrap();
        assert_eq!(store.get_history("t1", &doc.node.id, None).unwrap().len(), 2);

        let diff = store.diff("t1", &v1, &v2.id).unwrap();
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(diff.hunks[0].kind, HunkKind::Replace);

        let reverted = store.revert("t1", &doc.node.id, &v1, "a").unwrap();
        assert_ne!(reverted.id, v1);
        assert_eq!(reverted.summary, format!("Reverted to version {v1}"));
        assert_eq!(reverted.metadata["reverted_from"], v1.as_str());
        assert_eq!(store.get_history("t1", &doc.node.id, None).unwrap().len(), 3);

        assert!(store.diff("t1", &reverted.id, &v1).unwrap().is_empty());

        let original = store.get_version("t1", &v1).unwrap();
        assert_eq!(original.content, "v1");
    }

    #[test]
    fn test_put_file_if_match_semantics() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let folder = store.create_folder("t1", None, "Draft", None, "a").unwrap();

        let created = store
            .put_file("t1", Some(folder.id.as_str()), "Notes", WriteContent::new("a", "s"), None, "a")
            .unwrap();
        assert!(created.created);
        assert_eq!(created.file.node.path, "draft/notes");

        let err = store
            .put_file("t1", Some(folder.id.as_str()), "Notes", WriteContent::new("b", "s"), None, "a")
            .unwrap_err();
        assert_eq!(err.code(), "precondition_required");
        assert_eq!(err.http_status(), 428);

        let err = store
            .put_file("t1", Some(folder.id.as_str()), "notes", WriteContent::new("b", "s"), Some("stale"), "a")
            .unwrap_err();
        assert_eq!(err.code(), "version_conflict");

        let replaced = store
            .put_file(
                "t1",
                Some(folder.id.as_str()),
                "notes",
                WriteContent::new("b", "s"),
                Some(&created.file.version.id),
                "a",
            )
            .unwrap();
        assert!(!replaced.created);
        assert_eq!(replaced.file.node.id, created.file.node.id);
        assert_eq!(replaced.file.version.content, "b");
    }

    #[test]
    fn test_put_file_over_folder_rejected() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        store.create_folder("t1", None, "Draft", None, "a").unwrap();
        let err = store
            .put_file("t1", None, "Draft", WriteContent::new("x", "s"), Some("v"), "a")
            .unwrap_err();
        assert_eq!(err.code(), "not_a_file");
    }

    #[test]
    fn test_direct_write_clears_approval() {
        let (store, doc) = store_with_doc();
        store
            .with_transaction(|conn| {
                let mut file = find_file(conn, "t1", &doc.node.id)?.unwrap();
                mark_approved(conn, &mut file, "rev")
            })
            .unwrap();
        assert_eq!(
            store.read_file("t1", &doc.node.id).unwrap().file.review_status,
            ReviewStatus::Approved
        );

        store
            .write_version("t1", &doc.node.id, WriteContent::new("edit", "s"), None, "a")
            .unwrap();
        let file = store.read_file("t1", &doc.node.id).unwrap().file;
        assert_eq!(file.review_status, ReviewStatus::None);
        assert!(file.approved_by.is_none());
    }
}
