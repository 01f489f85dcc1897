//! Workspace content engine for Quire.
//!
//! A multi-tenant hierarchical node tree with materialized paths, an
//! append-only version store guarded by optimistic concurrency, and a
//! token-gated staging workflow that promotes agent drafts into the tree.
//!
//! Everything persists through a single [`WorkspaceStore`] backed by SQLite.

pub mod diff;
pub mod error;
pub mod layout;
pub mod naming;
pub mod search;
pub mod staging;
pub mod store;
pub mod types;
pub mod validation;

pub use diff::{Diff, Hunk, HunkKind, diff_lines};
pub use error::{
    Entity, ErrorClass, Result, StagingError, StagingErrorCode, ValidationError, WorkspaceError,
};
pub use naming::{
    ArtifactFolder, ArtifactPath, ArtifactRequest, AutoNamingPolicy, SequenceCounter,
    infer_extension,
};
pub use search::{SearchBackend, SearchFacade, SearchHit, SearchQuery, SearchResults};
pub use staging::{
    AuditAction, AuditRecord, Resubmission, StagingEntry, StagingStatus, StagingWorkflow,
    SubmitDraft,
};
pub use store::{PutOutcome, WorkspaceSettings, WorkspaceStore};
pub use types::{
    FileContent, FileRecord, MoveTarget, NewFile, Node, NodeKind, NodeUpdate, Relocate,
    ReviewStatus, TreeNode, TreeQuery, Version, VersionSummary, WriteContent,
};
