//! Core data types for the node tree and version store.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of a node in the tenant namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(Self::Folder),
            "file" => Ok(Self::File),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

/// A folder or file in a tenant's namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub tenant_id: String,
    pub parent_id: Option<String>,
    /// Display name as entered by the user.
    pub name: String,
    /// Url-safe form of `name`; the last segment of `path`.
    pub slug: String,
    pub kind: NodeKind,
    /// Slash-joined slugs from the root, e.g. `draft/chapter-1`.
    pub path: String,
    pub category: Option<String>,
    pub sort_order: i64,
    pub metadata: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Number of path segments (root nodes have depth 1).
    pub fn depth(&self) -> usize {
        self.path.split('/').count()
    }

    /// Whether `other` lies strictly beneath this node.
    pub fn is_ancestor_of(&self, other: &Node) -> bool {
        other.path.len() > self.path.len()
            && other.path.starts_with(&self.path)
            && other.path.as_bytes()[self.path.len()] == b'/'
    }
}

/// Review status recorded on a file when content arrives through staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Written directly; never went through review.
    None,
    /// Latest promotion from staging was approved.
    Approved,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Approved => "approved",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "approved" => Ok(Self::Approved),
            other => Err(format!("unknown review status: {other}")),
        }
    }
}

/// Content-bearing facet of a file node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub tenant_id: String,
    pub node_id: String,
    pub latest_version_id: Option<String>,
    pub category: Option<String>,
    pub review_status: ReviewStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// One immutable content snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub file_id: String,
    pub tenant_id: String,
    pub content: String,
    pub summary: String,
    pub author_agent: Option<String>,
    pub author_tool: Option<String>,
    pub metadata: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// History entry: version metadata without the content body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: String,
    pub summary: String,
    pub created_by: String,
    pub author_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub word_count: usize,
    pub char_count: usize,
}

impl VersionSummary {
    pub(crate) fn from_content(version: Version) -> Self {
        Self {
            word_count: version.content.split_whitespace().count(),
            char_count: version.content.chars().count(),
            id: version.id,
            summary: version.summary,
            created_by: version.created_by,
            author_agent: version.author_agent,
            created_at: version.created_at,
        }
    }
}

/// A file node together with its file facet and latest version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub node: Node,
    pub file: FileRecord,
    pub version: Version,
}

/// Content to commit as a new version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteContent {
    pub content: String,
    pub summary: String,
    #[serde(default)]
    pub author_agent: Option<String>,
    #[serde(default)]
    pub author_tool: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl WriteContent {
    pub fn new(content: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.author_agent = Some(agent.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.author_tool = Some(tool.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Input for creating a file node with its initial content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFile {
    pub parent_id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub initial: WriteContent,
}

impl NewFile {
    pub fn new(parent_id: Option<&str>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.map(String::from),
            name: name.into(),
            category: None,
            initial: WriteContent::new(content, "Initial version"),
        }
    }
}

/// Destination of a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTarget {
    /// Top level of the tenant namespace.
    Root,
    /// Inside the given folder.
    Folder(String),
}

/// Rename and/or move request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relocate {
    pub new_name: Option<String>,
    pub new_parent: Option<MoveTarget>,
    /// Fail with a conflict unless the node's `updated_at` still equals this.
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl Relocate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            new_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn move_to(target: MoveTarget) -> Self {
        Self {
            new_parent: Some(target),
            ..Self::default()
        }
    }

    pub fn expecting(mut self, updated_at: DateTime<Utc>) -> Self {
        self.expected_updated_at = Some(updated_at);
        self
    }
}

/// Attribute changes that do not affect paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// `Some(None)` clears the category.
    pub category: Option<Option<String>>,
    pub sort_order: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

/// Tree listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeQuery {
    /// Root the forest at this folder instead of the tenant root.
    pub parent_id: Option<String>,
    /// Levels of nesting to include; `None` uses the configured default.
    pub depth: Option<usize>,
}

/// A node with its (depth-limited) children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Total nodes in this subtree, including self.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str) -> Node {
        let now = Utc::now();
        Node {
            id: path.to_string(),
            tenant_id: "t".into(),
            parent_id: None,
            name: path.to_string(),
            slug: path.rsplit('/').next().unwrap_or(path).to_string(),
            kind: NodeKind::Folder,
            path: path.to_string(),
            category: None,
            sort_order: 0,
            metadata: serde_json::json!({}),
            created_by: "u".into(),
            created_at: now,
            updated_by: "u".into(),
            updated_at: now,
            deleted_by: None,
            deleted_at: None,
        }
    }

    #[test]
    fn test_ancestor_requires_segment_boundary() {
        let draft = node("draft");
        assert!(draft.is_ancestor_of(&node("draft/ch-1")));
        assert!(!draft.is_ancestor_of(&node("drafts/ch-1")));
        assert!(!draft.is_ancestor_of(&node("draft")));
    }

    #[test]
    fn test_depth() {
        assert_eq!(node("a").depth(), 1);
        assert_eq!(node("a/b/c").depth(), 3);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("file".parse::<NodeKind>().unwrap(), NodeKind::File);
        assert!("link".parse::<NodeKind>().is_err());
    }
}
