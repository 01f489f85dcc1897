//! Error types for the workspace engine.
//!
//! Every error maps to an [`ErrorClass`], a stable string code, and an HTTP
//! status so a transport layer can render it without matching on variants.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Broad error taxonomy used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input or wrong node type. No side effects.
    Validation,
    /// Stale precondition. Re-fetch and retry.
    Conflict,
    /// Unknown node, file, version, or staging entry.
    NotFound,
    /// Token or state-machine violation on a staging entry.
    Staging,
    /// Operation aborted by the caller before commit.
    Cancelled,
    /// Storage failure.
    Infrastructure,
}

/// Kind of entity named by a not-found error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Node,
    File,
    Version,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::File => "file",
            Self::Version => "version",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in the workspace engine.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Database connection or statement failed.
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization of a JSON column failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before touching storage.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Requested resource not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The caller's expected version is not the file's latest version.
    #[error("Version conflict on file {file_id}: expected {expected}, latest is {}", .actual.as_deref().unwrap_or("none"))]
    VersionConflict {
        file_id: String,
        expected: String,
        actual: Option<String>,
    },

    /// Replacing an existing file requires the caller to name the version it saw.
    #[error("Precondition required: {0}")]
    PreconditionRequired(String),

    /// A live node already occupies the target path.
    #[error("Path already exists: {0}")]
    PathConflict(String),

    /// The node changed since the caller read it.
    #[error("Node {node_id} was modified at {actual}, expected {expected}")]
    StaleNode {
        node_id: String,
        expected: String,
        actual: String,
    },

    /// Staging token or state-machine violation.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The caller interrupted the operation before commit.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<rusqlite::Error> for WorkspaceError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => WorkspaceError::Cancelled,
            _ => WorkspaceError::Database(err),
        }
    }
}

impl WorkspaceError {
    /// Not-found error for a node.
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: Entity::Node,
            id: id.into(),
        }
    }

    /// Not-found error for a file facet.
    pub fn file_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: Entity::File,
            id: id.into(),
        }
    }

    /// Not-found error for a version.
    pub fn version_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: Entity::Version,
            id: id.into(),
        }
    }

    /// Taxonomy bucket for this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::PreconditionRequired(_) => ErrorClass::Validation,
            Self::VersionConflict { .. } | Self::PathConflict(_) | Self::StaleNode { .. } => {
                ErrorClass::Conflict
            }
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Staging(_) => ErrorClass::Staging,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Database(_) | Self::Migration(_) | Self::Serialization(_) => {
                ErrorClass::Infrastructure
            }
        }
    }

    /// Stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "storage_error",
            Self::Migration(_) => "migration_error",
            Self::Serialization(_) => "serialization_error",
            Self::Validation(v) => v.code(),
            Self::NotFound { entity, .. } => match entity {
                Entity::Node => "node_not_found",
                Entity::File => "file_not_found",
                Entity::Version => "version_not_found",
            },
            Self::VersionConflict { .. } => "version_conflict",
            Self::PreconditionRequired(_) => "precondition_required",
            Self::PathConflict(_) => "path_conflict",
            Self::StaleNode { .. } => "stale_node",
            Self::Staging(e) => e.code.as_str(),
            Self::Cancelled => "cancelled",
        }
    }

    /// HTTP status a transport layer should use for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::PreconditionRequired(_) => 428,
            Self::NotFound { .. } => 404,
            Self::VersionConflict { .. } | Self::PathConflict(_) => 409,
            Self::StaleNode { .. } => 412,
            Self::Staging(e) => e.code.http_status(),
            Self::Cancelled => 499,
            Self::Database(_) | Self::Migration(_) | Self::Serialization(_) => 500,
        }
    }

    /// Whether the caller can recover by re-reading state and retrying.
    pub fn is_conflict(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }

    /// Whether this is a uniqueness violation from the backing store.
    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == ErrorCode::ConstraintViolation
                    && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
            }
            _ => false,
        }
    }
}

/// Result type alias for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;

// ─────────────────────────────────────────────────────────────────────────────
// Validation Error
// ─────────────────────────────────────────────────────────────────────────────

/// Structural input errors. Always raised before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Display name is empty or whitespace.
    #[error("name is empty")]
    EmptyName,

    /// Display name exceeds the allowed length.
    #[error("name is longer than {max} characters")]
    NameTooLong { max: usize },

    /// Display name produces an empty slug.
    #[error("name '{0}' has no url-safe characters")]
    UnsluggableName(String),

    /// Display name contains a path separator.
    #[error("name '{0}' must not contain '/'")]
    NameContainsSeparator(String),

    /// Parent (or target) node is not a folder.
    #[error("node {0} is not a folder")]
    NotAFolder(String),

    /// Content operation on a folder.
    #[error("node {0} is not a file")]
    NotAFile(String),

    /// Folder moved into itself or one of its descendants.
    #[error("cannot move {node_id} beneath its own subtree")]
    MoveIntoSubtree { node_id: String },

    /// Diff requested between versions of two different files.
    #[error("versions {a} and {b} belong to different files")]
    DiffAcrossFiles { a: String, b: String },

    /// Version does not belong to the file of the given node.
    #[error("version {version_id} does not belong to node {node_id}")]
    VersionNotOfNode { version_id: String, node_id: String },

    /// Workspace path is malformed.
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// Nothing to change.
    #[error("no changes requested")]
    NoChanges,
}

impl ValidationError {
    /// Stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyName => "empty_name",
            Self::NameTooLong { .. } => "name_too_long",
            Self::UnsluggableName(_) => "invalid_name",
            Self::NameContainsSeparator(_) => "invalid_name",
            Self::NotAFolder(_) => "not_a_folder",
            Self::NotAFile(_) => "not_a_file",
            Self::MoveIntoSubtree { .. } => "move_into_subtree",
            Self::DiffAcrossFiles { .. } => "diff_across_files",
            Self::VersionNotOfNode { .. } => "version_not_of_node",
            Self::InvalidPath(_) => "invalid_path",
            Self::NoChanges => "no_changes",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Staging Error
// ─────────────────────────────────────────────────────────────────────────────

/// Stable codes for staging workflow violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingErrorCode {
    /// No entry with that id for the tenant.
    NotFound,
    /// The review action carried no token.
    MissingToken,
    /// Token does not match the active token, or was already used.
    InvalidToken,
    /// The action is not allowed from the entry's current status.
    InvalidState,
    /// The entry is archived or rejected.
    AlreadyResolved,
    /// Secondary approval by the same reviewer as the primary approval.
    ReviewerNotIndependent,
    /// The entry is past its SLA deadline and deadlines are enforced.
    TokenExpired,
}

impl StagingErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "staging_not_found",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::InvalidState => "invalid_state",
            Self::AlreadyResolved => "already_resolved",
            Self::ReviewerNotIndependent => "reviewer_not_independent",
            Self::TokenExpired => "token_expired",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::MissingToken => 400,
            Self::InvalidToken | Self::ReviewerNotIndependent => 403,
            Self::InvalidState | Self::AlreadyResolved => 409,
            Self::TokenExpired => 410,
        }
    }
}

impl std::fmt::Display for StagingErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error for staging token and state-machine violations.
///
/// Distinct from [`WorkspaceError`] infrastructure failures so API layers
/// can render precise feedback ("already reviewed" vs. "expired token").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct StagingError {
    pub code: StagingErrorCode,
    pub message: String,
}

impl StagingError {
    pub fn new(code: StagingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let conflict = WorkspaceError::VersionConflict {
            file_id: "f".into(),
            expected: "a".into(),
            actual: Some("b".into()),
        };
        assert_eq!(conflict.code(), "version_conflict");
        assert_eq!(conflict.http_status(), 409);
        assert!(conflict.is_conflict());

        let missing = WorkspaceError::version_not_found("v1");
        assert_eq!(missing.code(), "version_not_found");
        assert_eq!(missing.http_status(), 404);
        assert_eq!(missing.class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_staging_error_distinct_from_bad_request() {
        let err: WorkspaceError =
            StagingError::new(StagingErrorCode::InvalidToken, "token already used").into();
        assert_eq!(err.class(), ErrorClass::Staging);
        assert_eq!(err.code(), "invalid_token");
        assert_ne!(err.code(), "bad_request");
        assert_eq!(err.to_string(), "invalid_token: token already used");
    }

    #[test]
    fn test_validation_codes() {
        let err: WorkspaceError = ValidationError::NotAFolder("n1".into()).into();
        assert_eq!(err.code(), "not_a_folder");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[test]
    fn test_interrupt_maps_to_cancelled() {
        let interrupted = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
            None,
        );
        let err: WorkspaceError = interrupted.into();
        assert!(matches!(err, WorkspaceError::Cancelled));
        assert_eq!(err.http_status(), 499);

        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err: WorkspaceError = busy.into();
        assert_eq!(err.class(), ErrorClass::Infrastructure);
    }

    #[test]
    fn test_conflict_message_without_latest() {
        let err = WorkspaceError::VersionConflict {
            file_id: "f".into(),
            expected: "a".into(),
            actual: None,
        };
        assert!(err.to_string().contains("latest is none"));
    }
}
