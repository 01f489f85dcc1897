//! Node tree operations: layout, create, rename/move, list, soft delete.

use std::collections::HashMap;

use chrono::SubsecRound;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ValidationError, WorkspaceError};
use crate::types::{
    FileContent, MoveTarget, NewFile, Node, NodeKind, NodeUpdate, Relocate, TreeNode, TreeQuery,
};
use crate::validation::{join_path, slug_for, split_path, validate_name};

use super::version_ops::commit_version;
use super::{WorkspaceStore, fmt_ts, get_json, get_opt_ts, get_ts, now, parse_enum};

pub(crate) const NODE_COLUMNS: &str = "id, tenant_id, parent_id, name, slug, kind, path, category, \
     sort_order, metadata, created_by, created_at, updated_by, updated_at, deleted_by, deleted_at";

/// Number of `/` separators in `path`, as a SQL expression.
const PATH_SLASHES: &str = "(length(path) - length(replace(path, '/', '')))";

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

impl WorkspaceStore {
    /// Create the configured top-level folders if the tenant has no nodes.
    ///
    /// Returns `true` when folders were created by this call. Tenants that
    /// already have nodes (including deleted ones) are left untouched.
    pub fn ensure_default_layout(&self, tenant_id: &str, actor: &str) -> Result<bool> {
        if self.layout_cache().is_initialized(tenant_id) {
            return Ok(false);
        }

        let folders = &self.settings().tree.default_layout;
        let result =
            self.with_transaction(|conn| seed_default_layout(conn, tenant_id, folders, actor));

        match result {
            Ok(created) => {
                self.layout_cache().mark(tenant_id);
                if created {
                    info!(tenant_id, folders = folders.len(), "Initialized default layout");
                }
                Ok(created)
            }
            Err(WorkspaceError::PathConflict(path)) => {
                debug!(tenant_id, %path, "Default layout created concurrently");
                self.layout_cache().mark(tenant_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Create a folder under `parent_id`, or at the tenant root.
    pub fn create_folder(
        &self,
        tenant_id: &str,
        parent_id: Option<&str>,
        name: &str,
        category: Option<&str>,
        actor: &str,
    ) -> Result<Node> {
        self.with_transaction(|conn| {
            let parent = resolve_parent(conn, tenant_id, parent_id)?;
            let draft = NodeDraft {
                category,
                ..NodeDraft::folder(parent.as_ref(), name)
            };
            insert_node(conn, tenant_id, draft, actor)
        })
    }

    /// Create a file node with its file record and initial version.
    pub fn create_file(&self, tenant_id: &str, file: NewFile, actor: &str) -> Result<FileContent> {
        self.with_transaction(|conn| {
            let parent = resolve_parent(conn, tenant_id, file.parent_id.as_deref())?;
            let draft = NodeDraft {
                category: file.category.as_deref(),
                ..NodeDraft::file(parent.as_ref(), &file.name)
            };
            let node = insert_node(conn, tenant_id, draft, actor)?;
            let (record, version) = commit_version(conn, tenant_id, &node, file.initial, None, actor)?;
            Ok(FileContent {
                node,
                file: record,
                version,
            })
        })
    }

    /// Rename and/or move a node.
    ///
    /// Moving or renaming a folder rewrites the path of every live
    /// descendant in the same transaction.
    pub fn relocate(
        &self,
        tenant_id: &str,
        node_id: &str,
        request: Relocate,
        actor: &str,
    ) -> Result<Node> {
        if request.new_name.is_none() && request.new_parent.is_none() {
            return Err(ValidationError::NoChanges.into());
        }

        self.with_transaction(|conn| {
            let node = load_node(conn, tenant_id, node_id)?;

            if let Some(expected) = request.expected_updated_at
                && expected.trunc_subsecs(6) != node.updated_at
            {
                return Err(WorkspaceError::StaleNode {
                    node_id: node.id.clone(),
                    expected: fmt_ts(&expected),
                    actual: fmt_ts(&node.updated_at),
                });
            }

            let name = match request.new_name.as_deref() {
                Some(name) => validate_name(name)?.to_string(),
                None => node.name.clone(),
            };
            let slug = slug_for(&name)?;

            let parent = match &request.new_parent {
                None => match node.parent_id.as_deref() {
                    Some(parent_id) => Some(load_node(conn, tenant_id, parent_id)?),
                    None => None,
                },
                Some(MoveTarget::Root) => None,
                Some(MoveTarget::Folder(folder_id)) => {
                    let folder = load_node(conn, tenant_id, folder_id)?;
                    if !folder.is_folder() {
                        return Err(ValidationError::NotAFolder(folder.id).into());
                    }
                    if folder.id == node.id || node.is_ancestor_of(&folder) {
                        return Err(ValidationError::MoveIntoSubtree { node_id: node.id }.into());
                    }
                    Some(folder)
                }
            };

            let new_path = join_path(parent.as_ref().map(|p| p.path.as_str()), &slug);
            if new_path != node.path
                && let Some(existing) = find_node_at_path(conn, tenant_id, &new_path)?
                && existing.id != node.id
            {
                return Err(WorkspaceError::PathConflict(new_path));
            }

            let ts = fmt_ts(&now());
            conn.execute(
                "UPDATE nodes SET name = ?3, slug = ?4, parent_id = ?5, path = ?6,
                    updated_by = ?7, updated_at = ?8
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    tenant_id,
                    node.id,
                    name,
                    slug,
                    parent.as_ref().map(|p| p.id.as_str()),
                    new_path,
                    actor,
                    ts,
                ],
            )
            .map_err(|e| path_conflict_or(e, &new_path))?;

            if node.is_folder() && new_path != node.path {
                let rewritten = conn
                    .execute(
                        &format!(
                            "UPDATE nodes SET path = ?3 || substr(path, length(?2) + 1)
                             WHERE tenant_id = ?1 AND deleted_at IS NULL
                               AND {}",
                            under_prefix("?2")
                        ),
                        params![tenant_id, node.path, new_path],
                    )
                    .map_err(|e| path_conflict_or(e, &new_path))?;
                debug!(
                    tenant_id,
                    node_id = %node.id,
                    from = %node.path,
                    to = %new_path,
                    descendants = rewritten,
                    "Rewrote descendant paths"
                );
            }

            load_node(conn, tenant_id, &node.id)
        })
    }

    /// Depth-limited forest rooted at the tenant root or at `query.parent_id`.
    ///
    /// Children are ordered by sort order, then case-insensitively by name.
    pub fn list_tree(&self, tenant_id: &str, query: &TreeQuery) -> Result<Vec<TreeNode>> {
        let tree = &self.settings().tree;
        let depth = query
            .depth
            .unwrap_or(tree.default_depth)
            .clamp(1, tree.max_depth.max(1));

        self.with_conn(|conn| {
            let (nodes, root_key) = match query.parent_id.as_deref() {
                None => {
                    let sql = format!(
                        "SELECT {NODE_COLUMNS} FROM nodes
                         WHERE tenant_id = ?1 AND deleted_at IS NULL AND {PATH_SLASHES} < ?2"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let nodes = stmt
                        .query_map(params![tenant_id, depth as i64], row_to_node)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    (nodes, None)
                }
                Some(parent_id) => {
                    let parent = load_node(conn, tenant_id, parent_id)?;
                    if !parent.is_folder() {
                        return Err(ValidationError::NotAFolder(parent.id).into());
                    }
                    let max_slashes = (parent.depth() - 1 + depth) as i64;
                    let sql = format!(
                        "SELECT {NODE_COLUMNS} FROM nodes
                         WHERE tenant_id = ?1 AND deleted_at IS NULL
                           AND {} AND {PATH_SLASHES} <= ?3",
                        under_prefix("?2")
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let nodes = stmt
                        .query_map(params![tenant_id, parent.path, max_slashes], row_to_node)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    (nodes, Some(parent.id))
                }
            };
            Ok(build_forest(nodes, root_key))
        })
    }

    /// Live direct children of a folder, or of the tenant root.
    pub fn list_children(&self, tenant_id: &str, parent_id: Option<&str>) -> Result<Vec<Node>> {
        self.with_conn(|conn| {
            resolve_parent(conn, tenant_id, parent_id)?;
            let sql = format!(
                "SELECT {NODE_COLUMNS} FROM nodes
                 WHERE tenant_id = ?1 AND parent_id IS ?2 AND deleted_at IS NULL
                 ORDER BY sort_order, name COLLATE NOCASE"
            );
            let mut stmt = conn.prepare(&sql)?;
            let nodes = stmt
                .query_map(params![tenant_id, parent_id], row_to_node)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(nodes)
        })
    }

    /// Soft-delete a node and, for folders, every live descendant.
    ///
    /// Returns the number of nodes marked deleted.
    pub fn delete_node(&self, tenant_id: &str, node_id: &str, actor: &str) -> Result<usize> {
        let affected = self.with_transaction(|conn| {
            let node = load_node(conn, tenant_id, node_id)?;
            let sql = format!(
                "UPDATE nodes SET deleted_at = ?4, deleted_by = ?5
                 WHERE tenant_id = ?1 AND deleted_at IS NULL
                   AND (id = ?2 OR {})",
                under_prefix("?3")
            );
            Ok(conn.execute(
                &sql,
                params![tenant_id, node.id, node.path, fmt_ts(&now()), actor],
            )?)
        })?;

        info!(tenant_id, node_id, affected, "Soft-deleted node");
        Ok(affected)
    }

    /// Get a live node by id.
    pub fn get_node(&self, tenant_id: &str, node_id: &str) -> Result<Node> {
        self.with_conn(|conn| load_node(conn, tenant_id, node_id))
    }

    /// Get a live node by workspace path.
    ///
    /// Each segment is slugified, so display names (`Draft/Chapter One`)
    /// resolve the same as slugs (`draft/chapter-one`).
    pub fn get_node_by_path(&self, tenant_id: &str, path: &str) -> Result<Node> {
        let normalized = normalize_path(path)?;
        self.with_conn(|conn| {
            find_node_at_path(conn, tenant_id, &normalized)?
                .ok_or_else(|| WorkspaceError::node_not_found(normalized.clone()))
        })
    }

    /// Change category, sort order or metadata without touching paths.
    pub fn update_node_metadata(
        &self,
        tenant_id: &str,
        node_id: &str,
        update: NodeUpdate,
        actor: &str,
    ) -> Result<Node> {
        if update.category.is_none() && update.sort_order.is_none() && update.metadata.is_none() {
            return Err(ValidationError::NoChanges.into());
        }

        self.with_transaction(|conn| {
            let node = load_node(conn, tenant_id, node_id)?;
            let category = update.category.unwrap_or(node.category);
            let sort_order = update.sort_order.unwrap_or(node.sort_order);
            let metadata = update.metadata.unwrap_or(node.metadata);

            conn.execute(
                "UPDATE nodes SET category = ?3, sort_order = ?4, metadata = ?5,
                    updated_by = ?6, updated_at = ?7
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    tenant_id,
                    node.id,
                    category,
                    sort_order,
                    serde_json::to_string(&metadata)?,
                    actor,
                    fmt_ts(&now()),
                ],
            )?;
            if node.kind == NodeKind::File {
                conn.execute(
                    "UPDATE files SET category = ?2 WHERE node_id = ?1",
                    params![node.id, category],
                )?;
            }

            load_node(conn, tenant_id, &node.id)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction-level helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Attributes of a node about to be inserted.
pub(crate) struct NodeDraft<'a> {
    pub parent: Option<&'a Node>,
    pub name: &'a str,
    pub kind: NodeKind,
    pub category: Option<&'a str>,
    pub sort_order: i64,
}

impl<'a> NodeDraft<'a> {
    pub fn folder(parent: Option<&'a Node>, name: &'a str) -> Self {
        Self {
            parent,
            name,
            kind: NodeKind::Folder,
            category: None,
            sort_order: 0,
        }
    }

    pub fn file(parent: Option<&'a Node>, name: &'a str) -> Self {
        Self {
            kind: NodeKind::File,
            ..Self::folder(parent, name)
        }
    }

    fn sorted(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Insert `folders` at the tenant root if the tenant has never had a node.
///
/// Returns `true` when the folders were inserted. Runs inside the caller's
/// transaction; the caller marks the layout cache after commit.
pub(crate) fn seed_default_layout(
    conn: &Connection,
    tenant_id: &str,
    folders: &[String],
    actor: &str,
) -> Result<bool> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM nodes WHERE tenant_id = ?1",
        params![tenant_id],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Ok(false);
    }

    for (order, name) in folders.iter().enumerate() {
        insert_node(
            conn,
            tenant_id,
            NodeDraft::folder(None, name).sorted(order as i64),
            actor,
        )?;
    }
    Ok(true)
}

/// Insert a node after validating its name and checking path uniqueness.
pub(crate) fn insert_node(
    conn: &Connection,
    tenant_id: &str,
    draft: NodeDraft<'_>,
    actor: &str,
) -> Result<Node> {
    let name = validate_name(draft.name)?;
    let slug = slug_for(name)?;
    let path = join_path(draft.parent.map(|p| p.path.as_str()), &slug);

    if find_node_at_path(conn, tenant_id, &path)?.is_some() {
        return Err(WorkspaceError::PathConflict(path));
    }

    let ts = now();
    let node = Node {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        parent_id: draft.parent.map(|p| p.id.clone()),
        name: name.to_string(),
        slug,
        kind: draft.kind,
        path,
        category: draft.category.map(String::from),
        sort_order: draft.sort_order,
        metadata: serde_json::json!({}),
        created_by: actor.to_string(),
        created_at: ts,
        updated_by: actor.to_string(),
        updated_at: ts,
        deleted_by: None,
        deleted_at: None,
    };

    let ts = fmt_ts(&ts);
    conn.execute(
        "INSERT INTO nodes (id, tenant_id, parent_id, name, slug, kind, path, category,
            sort_order, metadata, created_by, created_at, updated_by, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, '{}', ?10, ?11, ?10, ?11)",
        params![
            node.id,
            node.tenant_id,
            node.parent_id,
            node.name,
            node.slug,
            node.kind.as_str(),
            node.path,
            node.category,
            node.sort_order,
            actor,
            ts,
        ],
    )
    .map_err(|e| path_conflict_or(e, &node.path))?;

    debug!(tenant_id, node_id = %node.id, path = %node.path, kind = %node.kind, "Created node");
    Ok(node)
}

/// Walk `segments` from the root, creating any missing folders.
///
/// Returns the deepest folder, or `None` when `segments` is empty.
pub(crate) fn ensure_folder_path(
    conn: &Connection,
    tenant_id: &str,
    segments: &[&str],
    actor: &str,
) -> Result<Option<Node>> {
    let mut parent: Option<Node> = None;
    for segment in segments {
        let slug = slug_for(segment)?;
        let path = join_path(parent.as_ref().map(|p| p.path.as_str()), &slug);
        let folder = match find_node_at_path(conn, tenant_id, &path)? {
            Some(existing) if existing.is_folder() => existing,
            Some(existing) => return Err(ValidationError::NotAFolder(existing.id).into()),
            None => insert_node(conn, tenant_id, NodeDraft::folder(parent.as_ref(), segment), actor)?,
        };
        parent = Some(folder);
    }
    Ok(parent)
}

/// Resolve an optional parent id to a live folder.
pub(crate) fn resolve_parent(
    conn: &Connection,
    tenant_id: &str,
    parent_id: Option<&str>,
) -> Result<Option<Node>> {
    let Some(parent_id) = parent_id else {
        return Ok(None);
    };
    let parent = load_node(conn, tenant_id, parent_id)?;
    if !parent.is_folder() {
        return Err(ValidationError::NotAFolder(parent.id).into());
    }
    Ok(Some(parent))
}

pub(crate) fn load_node(conn: &Connection, tenant_id: &str, node_id: &str) -> Result<Node> {
    let sql = format!(
        "SELECT {NODE_COLUMNS} FROM nodes
         WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL"
    );
    conn.query_row(&sql, params![tenant_id, node_id], row_to_node)
        .optional()?
        .ok_or_else(|| WorkspaceError::node_not_found(node_id))
}

pub(crate) fn find_node_at_path(
    conn: &Connection,
    tenant_id: &str,
    path: &str,
) -> Result<Option<Node>> {
    let sql = format!(
        "SELECT {NODE_COLUMNS} FROM nodes
         WHERE tenant_id = ?1 AND path = ?2 AND deleted_at IS NULL"
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, path], row_to_node)
        .optional()?)
}

/// Slugify every segment of a user-supplied path.
pub(crate) fn normalize_path(path: &str) -> Result<String> {
    let segments = split_path(path)?
        .into_iter()
        .map(slug_for)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(segments.join("/"))
}

pub(crate) fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        parent_id: row.get(2)?,
        name: row.get(3)?,
        slug: row.get(4)?,
        kind: parse_enum(row, 5)?,
        path: row.get(6)?,
        category: row.get(7)?,
        sort_order: row.get(8)?,
        metadata: get_json(row, 9)?,
        created_by: row.get(10)?,
        created_at: get_ts(row, 11)?,
        updated_by: row.get(12)?,
        updated_at: get_ts(row, 13)?,
        deleted_by: row.get(14)?,
        deleted_at: get_opt_ts(row, 15)?,
    })
}

/// SQL predicate: `path` lies strictly beneath the path bound to `param`.
fn under_prefix(param: &str) -> String {
    format!("substr(path, 1, length({param}) + 1) = {param} || '/'")
}

fn path_conflict_or(err: rusqlite::Error, path: &str) -> WorkspaceError {
    let err = WorkspaceError::from(err);
    if err.is_unique_violation() {
        WorkspaceError::PathConflict(path.to_string())
    } else {
        err
    }
}

fn build_forest(nodes: Vec<Node>, root_key: Option<String>) -> Vec<TreeNode> {
    let mut by_parent: HashMap<Option<String>, Vec<Node>> = HashMap::new();
    for node in nodes {
        by_parent.entry(node.parent_id.clone()).or_default().push(node);
    }
    attach(&root_key, &mut by_parent)
}

fn attach(key: &Option<String>, by_parent: &mut HashMap<Option<String>, Vec<Node>>) -> Vec<TreeNode> {
    let mut children = by_parent.remove(key).unwrap_or_default();
    children.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    children
        .into_iter()
        .map(|node| {
            let children = attach(&Some(node.id.clone()), by_parent);
            TreeNode { node, children }
        })
        .collect()
}


/// Property-based tests for path consistency.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: after any sequence of folder renames, every live node's
        /// path equals its parent's path plus its slug, and paths are unique.
        #[test]
        fn paths_stay_consistent(renames in prop::collection::vec((0usize..4, "[a-e]{1,3}"), 1..8)) {
            let store = WorkspaceStore::open_in_memory().unwrap();
            let a = store.create_folder("t", None, "a0", None, "u").unwrap();
            let b = store.create_folder("t", Some(a.id.as_str()), "b0", None, "u").unwrap();
            let c = store.create_folder("t", Some(b.id.as_str()), "c0", None, "u").unwrap();
            let d = store.create_folder("t", None, "d0", None, "u").unwrap();
            let ids = [a.id, b.id, c.id, d.id];

            for (idx, name) in renames {
                // Conflicts are expected and must leave the tree unchanged.
                let _ = store.relocate("t", &ids[idx], Relocate::rename(name), "u");
            }

            let mut seen = HashSet::new();
            for id in &ids {
                let node = store.get_node("t", id).unwrap();
                prop_assert!(seen.insert(node.path.clone()));
                let expected = match &node.parent_id {
                    Some(pid) => format!("{}/{}", store.get_node("t", pid).unwrap().path, node.slug),
                    None => node.slug.clone(),
                };
                prop_assert_eq!(node.path, expected);
            }
        }
    }
}
