//! Review workflow for agent-submitted drafts.
//!
//! ```text
//! drafted ──resubmit──▶ pending ──approve──▶ archived
//!    ▲                    │  │
//!    │                    │  └─approve (two-stage)─▶ awaiting_secondary ──approve──▶ archived
//!    └─request changes────┤                                 │
//!                         └─reject──▶ rejected ◀──reject────┘
//! ```
//!
//! Every review action must present the entry's active token. Tokens are
//! single-use: once an action consumes a token, replaying it fails with
//! `invalid_token` no matter what state the entry is in. Promotion into the
//! tree happens inside the same transaction as the final approval.

use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use quire_config::StagingConfig;
use rand::RngCore;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StagingError, StagingErrorCode, ValidationError};
use crate::naming::{ArtifactRequest, AutoNamingPolicy, SequenceCounter};
use crate::store::node_ops::{
    NodeDraft, ensure_folder_path, find_node_at_path, insert_node, seed_default_layout,
};
use crate::store::staging_ops::{
    insert_entry, list_entries, list_overdue_entries, load_entry, save_entry,
};
use crate::store::version_ops::{commit_version, mark_approved};
use crate::store::{WorkspaceStore, now};
use crate::types::WriteContent;
use crate::validation::{join_path, slug_for, split_path};

/// Upper bound on entries returned by one listing call.
const MAX_LIST_LIMIT: usize = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Position of an entry in the review state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStatus {
    /// Editable; waiting for the author to resubmit.
    Drafted,
    /// Waiting for the primary review.
    Pending,
    /// Primary approval given; waiting for an independent second review.
    AwaitingSecondary,
    /// Approved and promoted. Terminal.
    Archived,
    /// Rejected. Terminal.
    Rejected,
}

impl StagingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drafted => "drafted",
            Self::Pending => "pending",
            Self::AwaitingSecondary => "awaiting_secondary",
            Self::Archived => "archived",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived | Self::Rejected)
    }

    /// Whether a reviewer currently owes this entry a decision.
    pub fn is_under_review(&self) -> bool {
        matches!(self, Self::Pending | Self::AwaitingSecondary)
    }
}

impl std::fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StagingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "drafted" => Ok(Self::Drafted),
            "pending" => Ok(Self::Pending),
            "awaiting_secondary" => Ok(Self::AwaitingSecondary),
            "archived" => Ok(Self::Archived),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown staging status: {other}")),
        }
    }
}

/// Kind of event in an entry's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Submitted,
    PrimaryApproved,
    SecondaryApproved,
    Promoted,
    Rejected,
    ChangesRequested,
    Resubmitted,
}

/// One append-only audit trail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    /// Status after the action.
    pub status: StagingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A draft in the staging area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingEntry {
    pub id: String,
    pub tenant_id: String,
    pub file_type: String,
    pub suggested_name: String,
    pub suggested_folder: String,
    pub suggested_path: String,
    pub content: String,
    pub summary: String,
    pub source_agent_id: Option<String>,
    pub source_agent_name: Option<String>,
    pub source_command: Option<String>,
    pub session_id: Option<String>,
    pub status: StagingStatus,
    pub requires_secondary: bool,
    pub primary_reviewer_id: Option<String>,
    pub secondary_reviewer_id: Option<String>,
    pub primary_token: Option<String>,
    pub secondary_token: Option<String>,
    pub primary_approved_by: Option<String>,
    pub consumed_tokens: Vec<String>,
    pub sla_deadline: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    pub audit_trail: Vec<AuditRecord>,
    pub resubmission_count: i64,
    pub metadata: serde_json::Value,
    pub promoted_node_id: Option<String>,
    pub promoted_version_id: Option<String>,
}

impl StagingEntry {
    /// Token the next review action must present, if a review is open.
    pub fn active_token(&self) -> Option<&str> {
        match self.status {
            StagingStatus::Pending => self.primary_token.as_deref(),
            StagingStatus::AwaitingSecondary => self.secondary_token.as_deref(),
            _ => None,
        }
    }

    /// Under review and past the SLA deadline.
    pub fn is_overdue(&self, at: DateTime<Utc>) -> bool {
        self.status.is_under_review() && at > self.sla_deadline
    }

    fn consume_tokens(&mut self) {
        for token in [self.primary_token.take(), self.secondary_token.take()]
            .into_iter()
            .flatten()
        {
            self.consumed_tokens.push(token);
        }
    }

    fn record(
        &mut self,
        action: AuditAction,
        actor: &str,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.audit_trail.push(AuditRecord {
            at,
            actor: actor.to_string(),
            action,
            status: self.status,
            note,
        });
    }

    fn transition(
        &mut self,
        to: StagingStatus,
        action: AuditAction,
        actor: &str,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.status = to;
        self.last_transition_at = at;
        self.record(action, actor, at, note);
    }

    fn set_metadata(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        if !self.metadata.is_object() {
            self.metadata = serde_json::json!({});
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
    }
}

/// A draft to submit for review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitDraft {
    pub file_type: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    /// Name hint; wins over the content's first line.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source_agent_id: Option<String>,
    #[serde(default)]
    pub source_agent_name: Option<String>,
    #[serde(default)]
    pub source_command: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Overrides the configured default.
    #[serde(default)]
    pub requires_secondary: Option<bool>,
    #[serde(default)]
    pub primary_reviewer_id: Option<String>,
    #[serde(default)]
    pub secondary_reviewer_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl SubmitDraft {
    pub fn new(file_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_type: file_type.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn from_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.source_agent_id = Some(agent_id.into());
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn two_stage(mut self, requires_secondary: bool) -> Self {
        self.requires_secondary = Some(requires_secondary);
        self
    }
}

/// Changes applied when a drafted entry goes back to review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resubmission {
    pub content: Option<String>,
    pub summary: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow
// ─────────────────────────────────────────────────────────────────────────────

/// Drives staging entries through review and promotion.
///
/// Borrows the store and the caller-owned sequence counters.
pub struct StagingWorkflow<'a> {
    store: &'a WorkspaceStore,
    counters: &'a SequenceCounter,
    policy: AutoNamingPolicy,
    config: StagingConfig,
}

impl<'a> StagingWorkflow<'a> {
    pub fn new(store: &'a WorkspaceStore, counters: &'a SequenceCounter) -> Self {
        let settings = store.settings();
        Self {
            store,
            counters,
            policy: AutoNamingPolicy::new(settings.naming.clone()),
            config: settings.staging.clone(),
        }
    }

    pub fn policy(&self) -> &AutoNamingPolicy {
        &self.policy
    }

    /// Create a `pending` entry with a fresh primary token.
    pub fn submit(&self, tenant_id: &str, draft: SubmitDraft) -> Result<StagingEntry> {
        let at = now();
        let file_type = match draft.file_type.trim() {
            "" => "draft".to_string(),
            t => t.to_lowercase(),
        };

        let request = ArtifactRequest {
            artifact_type: file_type.clone(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            agent_id: draft.source_agent_id.clone(),
            session_id: draft.session_id.clone(),
        };
        let artifact = self.policy.generate_artifact_path(&request, self.counters, at);

        let submitter = draft
            .source_agent_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let mut entry = StagingEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            file_type,
            suggested_name: artifact.filename,
            suggested_folder: artifact.directory,
            suggested_path: artifact.path,
            summary: draft
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Staged draft".to_string()),
            content: draft.content,
            source_agent_id: draft.source_agent_id,
            source_agent_name: draft.source_agent_name,
            source_command: draft.source_command,
            session_id: draft.session_id,
            status: StagingStatus::Pending,
            requires_secondary: draft
                .requires_secondary
                .unwrap_or(self.config.default_requires_secondary),
            primary_reviewer_id: draft.primary_reviewer_id,
            secondary_reviewer_id: draft.secondary_reviewer_id,
            primary_token: Some(generate_token()),
            secondary_token: None,
            primary_approved_by: None,
            consumed_tokens: Vec::new(),
            sla_deadline: at + Duration::hours(self.config.sla_hours),
            submitted_at: at,
            last_transition_at: at,
            audit_trail: Vec::new(),
            resubmission_count: 0,
            metadata: draft.metadata.unwrap_or_else(|| serde_json::json!({})),
            promoted_node_id: None,
            promoted_version_id: None,
        };
        entry.record(AuditAction::Submitted, &submitter, at, None);

        self.store.with_transaction(|conn| insert_entry(conn, &entry))?;
        info!(
            tenant_id,
            entry_id = %entry.id,
            path = %entry.suggested_path,
            requires_secondary = entry.requires_secondary,
            "Staged draft submitted"
        );
        Ok(entry)
    }

    /// Approve with the active token.
    ///
    /// Single-stage entries (and two-stage entries on their second approval)
    /// are promoted into the tree and archived. The first approval of a
    /// two-stage entry issues a new secondary token instead.
    pub fn approve(
        &self,
        tenant_id: &str,
        entry_id: &str,
        token: &str,
        reviewer: &str,
    ) -> Result<StagingEntry> {
        let (entry, promoted) = self.store.with_transaction(|conn| {
            let mut entry = self.load(conn, tenant_id, entry_id)?;
            authorize(&entry, token)?;

            let at = now();
            if self.config.enforce_deadline && entry.is_overdue(at) {
                return Err(StagingError::new(
                    StagingErrorCode::TokenExpired,
                    format!("review deadline passed at {}", entry.sla_deadline.to_rfc3339()),
                )
                .into());
            }

            let mut promoted = false;
            match entry.status {
                StagingStatus::Pending if entry.requires_secondary => {
                    entry.consume_tokens();
                    entry.primary_approved_by = Some(reviewer.to_string());
                    entry.secondary_token = Some(generate_token());
                    entry.transition(
                        StagingStatus::AwaitingSecondary,
                        AuditAction::PrimaryApproved,
                        reviewer,
                        at,
                        None,
                    );
                }
                StagingStatus::Pending => {
                    entry.consume_tokens();
                    entry.primary_approved_by = Some(reviewer.to_string());
                    entry.transition(
                        StagingStatus::Archived,
                        AuditAction::PrimaryApproved,
                        reviewer,
                        at,
                        None,
                    );
                    self.promote(conn, &mut entry, reviewer, at)?;
                    promoted = true;
                }
                StagingStatus::AwaitingSecondary => {
                    if entry.primary_approved_by.as_deref() == Some(reviewer) {
                        return Err(StagingError::new(
                            StagingErrorCode::ReviewerNotIndependent,
                            format!("{reviewer} already gave the primary approval"),
                        )
                        .into());
                    }
                    entry.consume_tokens();
                    entry.transition(
                        StagingStatus::Archived,
                        AuditAction::SecondaryApproved,
                        reviewer,
                        at,
                        None,
                    );
                    self.promote(conn, &mut entry, reviewer, at)?;
                    promoted = true;
                }
                status => return Err(invalid_state(status, "approve").into()),
            }

            save_entry(conn, &entry)?;
            Ok((entry, promoted))
        })?;

        if promoted {
            self.store.layout_cache().mark(tenant_id);
        }
        info!(tenant_id, entry_id, status = %entry.status, reviewer, "Staged draft approved");
        Ok(entry)
    }

    /// Reject with the active token. Terminal.
    pub fn reject(
        &self,
        tenant_id: &str,
        entry_id: &str,
        token: &str,
        reviewer: &str,
        reason: &str,
    ) -> Result<StagingEntry> {
        let entry = self.store.with_transaction(|conn| {
            let mut entry = self.load(conn, tenant_id, entry_id)?;
            authorize(&entry, token)?;

            let at = now();
            entry.consume_tokens();
            entry.set_metadata("rejection_reason", reason);
            entry.transition(
                StagingStatus::Rejected,
                AuditAction::Rejected,
                reviewer,
                at,
                Some(reason.to_string()),
            );
            save_entry(conn, &entry)?;
            Ok(entry)
        })?;

        info!(tenant_id, entry_id, reviewer, "Staged draft rejected");
        Ok(entry)
    }

    /// Send the entry back to `drafted` for revision.
    ///
    /// Every outstanding token is consumed and the resubmission counter
    /// increments.
    pub fn request_changes(
        &self,
        tenant_id: &str,
        entry_id: &str,
        token: &str,
        reviewer: &str,
        reason: &str,
    ) -> Result<StagingEntry> {
        let entry = self.store.with_transaction(|conn| {
            let mut entry = self.load(conn, tenant_id, entry_id)?;
            authorize(&entry, token)?;

            let at = now();
            entry.consume_tokens();
            entry.primary_approved_by = None;
            entry.resubmission_count += 1;
            entry.set_metadata("change_request", reason);
            entry.transition(
                StagingStatus::Drafted,
                AuditAction::ChangesRequested,
                reviewer,
                at,
                Some(reason.to_string()),
            );
            save_entry(conn, &entry)?;
            Ok(entry)
        })?;

        info!(tenant_id, entry_id, reviewer, "Changes requested on staged draft");
        Ok(entry)
    }

    /// Return a `drafted` entry to `pending` with a new token and deadline.
    pub fn resubmit(
        &self,
        tenant_id: &str,
        entry_id: &str,
        changes: Resubmission,
        actor: &str,
    ) -> Result<StagingEntry> {
        let entry = self.store.with_transaction(|conn| {
            let mut entry = self.load(conn, tenant_id, entry_id)?;
            if entry.status.is_terminal() {
                return Err(already_resolved(&entry).into());
            }
            if entry.status != StagingStatus::Drafted {
                return Err(invalid_state(entry.status, "resubmit").into());
            }

            let at = now();
            if let Some(content) = changes.content {
                entry.content = content;
            }
            if let Some(summary) = changes.summary.filter(|s| !s.trim().is_empty()) {
                entry.summary = summary;
            }
            entry.primary_token = Some(generate_token());
            entry.sla_deadline = at + Duration::hours(self.config.sla_hours);
            entry.transition(
                StagingStatus::Pending,
                AuditAction::Resubmitted,
                actor,
                at,
                None,
            );
            save_entry(conn, &entry)?;
            Ok(entry)
        })?;

        info!(tenant_id, entry_id, resubmissions = entry.resubmission_count, "Staged draft resubmitted");
        Ok(entry)
    }

    pub fn get(&self, tenant_id: &str, entry_id: &str) -> Result<StagingEntry> {
        self.store
            .with_conn(|conn| self.load(conn, tenant_id, entry_id))
    }

    /// Entries newest first, optionally filtered by status.
    pub fn list_by_status(
        &self,
        tenant_id: &str,
        status: Option<StagingStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StagingEntry>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        self.store
            .with_conn(|conn| list_entries(conn, tenant_id, status, limit, offset))
    }

    /// Entries under review whose deadline has passed, oldest deadline first.
    pub fn list_overdue(&self, tenant_id: &str) -> Result<Vec<StagingEntry>> {
        self.list_overdue_at(tenant_id, now())
    }

    pub fn list_overdue_at(&self, tenant_id: &str, at: DateTime<Utc>) -> Result<Vec<StagingEntry>> {
        self.store
            .with_conn(|conn| list_overdue_entries(conn, tenant_id, at))
    }

    /// Whether the entry is under review and past its deadline.
    ///
    /// Overdue entries are only surfaced; they never transition on their own.
    pub fn is_overdue(&self, tenant_id: &str, entry_id: &str) -> Result<bool> {
        Ok(self.get(tenant_id, entry_id)?.is_overdue(now()))
    }

    /// Write the entry's content into the tree at its suggested path.
    ///
    /// A tenant with no nodes gets the default layout first. Missing folders
    /// are created; an existing file at the path receives a new version. The
    /// file is marked approved by `approver`.
    fn promote(
        &self,
        conn: &Connection,
        entry: &mut StagingEntry,
        approver: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let tenant_id = entry.tenant_id.as_str();
        if !self.store.layout_cache().is_initialized(tenant_id) {
            let layout = &self.store.settings().tree.default_layout;
            if seed_default_layout(conn, tenant_id, layout, approver)? {
                debug!(tenant_id, "Seeded default layout during promotion");
            }
        }
        promote_at_path(conn, entry, approver, at)
    }

    fn load(&self, conn: &Connection, tenant_id: &str, entry_id: &str) -> Result<StagingEntry> {
        load_entry(conn, tenant_id, entry_id)?.ok_or_else(|| {
            StagingError::new(
                StagingErrorCode::NotFound,
                format!("no staging entry {entry_id}"),
            )
            .into()
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Check a review token against the entry.
///
/// Order matters: a replayed token reports `invalid_token` even after the
/// entry has been resolved.
fn authorize(entry: &StagingEntry, token: &str) -> std::result::Result<(), StagingError> {
    if token.trim().is_empty() {
        return Err(StagingError::new(
            StagingErrorCode::MissingToken,
            "a review token is required",
        ));
    }
    if entry.consumed_tokens.iter().any(|t| t == token) {
        return Err(StagingError::new(
            StagingErrorCode::InvalidToken,
            "token has already been used",
        ));
    }
    if entry.status.is_terminal() {
        return Err(already_resolved(entry));
    }
    match entry.active_token() {
        Some(active) if active == token => Ok(()),
        Some(_) => Err(StagingError::new(
            StagingErrorCode::InvalidToken,
            "token does not match the open review",
        )),
        None => Err(invalid_state(entry.status, "review")),
    }
}

fn already_resolved(entry: &StagingEntry) -> StagingError {
    StagingError::new(
        StagingErrorCode::AlreadyResolved,
        format!("entry {} is already {}", entry.id, entry.status),
    )
}

fn invalid_state(status: StagingStatus, action: &str) -> StagingError {
    StagingError::new(
        StagingErrorCode::InvalidState,
        format!("cannot {action} an entry that is {status}"),
    )
}

/// Commit the entry's content at its suggested path, creating folders and
/// the file node as needed.
fn promote_at_path(
    conn: &Connection,
    entry: &mut StagingEntry,
    approver: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    let segments = split_path(&entry.suggested_path)?;
    let Some((name, folders)) = segments.split_last() else {
        return Err(ValidationError::InvalidPath(entry.suggested_path.clone()).into());
    };

    let tenant_id = entry.tenant_id.as_str();
    let parent = ensure_folder_path(conn, tenant_id, folders, approver)?;
    let path = join_path(parent.as_ref().map(|p| p.path.as_str()), &slug_for(name)?);

    let mut content = WriteContent::new(entry.content.clone(), entry.summary.clone())
        .with_tool("staging")
        .with_metadata(serde_json::json!({
            "staging_entry_id": entry.id,
            "source_command": entry.source_command,
        }));
    content.author_agent = entry
        .source_agent_name
        .clone()
        .or_else(|| entry.source_agent_id.clone());

    let node = match find_node_at_path(conn, tenant_id, &path)? {
        Some(node) => node,
        None => {
            let draft = NodeDraft {
                category: Some(entry.file_type.as_str()),
                ..NodeDraft::file(parent.as_ref(), name)
            };
            insert_node(conn, tenant_id, draft, approver)?
        }
    };
    let (mut file, version) = commit_version(conn, tenant_id, &node, content, None, approver)?;
    mark_approved(conn, &mut file, approver)?;

    debug!(
        tenant_id,
        entry_id = %entry.id,
        node_id = %node.id,
        version_id = %version.id,
        "Promoted staged draft"
    );
    entry.record(
        AuditAction::Promoted,
        approver,
        at,
        Some(format!("{} @ {}", node.path, version.id)),
    );
    entry.promoted_node_id = Some(node.id);
    entry.promoted_version_id = Some(version.id);
    Ok(())
}

/// 32-character URL-safe review token.
fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkspaceError;
    use crate::store::WorkspaceSettings;
    use crate::types::NodeKind;
    use crate::types::ReviewStatus;

    fn staging_code(err: WorkspaceError) -> StagingErrorCode {
        match err {
            WorkspaceError::Staging(e) => e.code,
            other => panic!("expected staging error, got {other:?}"),
        }
    }

    fn token(entry: &StagingEntry) -> String {
        entry.active_token().unwrap().to_string()
    }

    #[test]
    fn test_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_submit_creates_pending_entry() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);

        let entry = workflow
            .submit("t1", SubmitDraft::new("outline", "# Act One\nbeats").from_agent("planner"))
            .unwrap();

        assert_eq!(entry.status, StagingStatus::Pending);
        assert_eq!(entry.suggested_folder, "outline");
        assert_eq!(entry.suggested_path, "outline/outline-act-one-1.md");
        assert_eq!(entry.primary_token.as_ref().map(String::len), Some(32));
        assert_eq!(entry.sla_deadline - entry.submitted_at, Duration::hours(48));
        assert_eq!(entry.audit_trail.len(), 1);
        assert_eq!(entry.audit_trail[0].action, AuditAction::Submitted);
        assert_eq!(entry.audit_trail[0].actor, "planner");

        assert_eq!(workflow.get("t1", &entry.id).unwrap(), entry);
    }

    #[test]
    fn test_single_stage_approval_promotes() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);

        let entry = workflow
            .submit("t1", SubmitDraft::new("research", "Sources\n- a").titled("Sources"))
            .unwrap();
        let approved = workflow.approve("t1", &entry.id, &token(&entry), "rev").unwrap();

        assert_eq!(approved.status, StagingStatus::Archived);
        assert_eq!(approved.primary_approved_by.as_deref(), Some("rev"));
        let node_id = approved.promoted_node_id.clone().unwrap();
        let content = store.read_file("t1", &node_id).unwrap();
        assert_eq!(content.node.path, approved.suggested_path);
        assert_eq!(content.version.content, "Sources\n- a");
        assert_eq!(content.version.author_tool.as_deref(), Some("staging"));
        assert_eq!(content.file.review_status, ReviewStatus::Approved);
        assert_eq!(content.file.approved_by.as_deref(), Some("rev"));

        // Default layout exists and the promoted file sits inside it.
        let research = store.get_node_by_path("t1", "research").unwrap();
        assert_eq!(research.name, "Research");
        assert_eq!(content.node.parent_id.as_deref(), Some(research.id.as_str()));

        let actions: Vec<_> = approved.audit_trail.iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Submitted, AuditAction::PrimaryApproved, AuditAction::Promoted]
        );
    }

    #[test]
    fn test_two_stage_outline_scenario() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);

        let entry = workflow
            .submit("t1", SubmitDraft::new("outline", "Three acts").two_stage(true))
            .unwrap();
        let primary = token(&entry);

        let after_primary = workflow.approve("t1", &entry.id, &primary, "alice").unwrap();
        assert_eq!(after_primary.status, StagingStatus::AwaitingSecondary);
        let secondary = token(&after_primary);
        assert_ne!(secondary, primary);
        assert!(after_primary.promoted_node_id.is_none());
        assert!(store.get_node_by_path("t1", &entry.suggested_path).is_err());

        let err = workflow.approve("t1", &entry.id, &primary, "bob").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::InvalidToken);

        let archived = workflow.approve("t1", &entry.id, &secondary, "bob").unwrap();
        assert_eq!(archived.status, StagingStatus::Archived);

        let node = store.get_node_by_path("t1", &entry.suggested_path).unwrap();
        assert_eq!(node.kind, NodeKind::File);
        assert_eq!(Some(node.id.clone()), archived.promoted_node_id);
        let content = store.read_file("t1", &node.id).unwrap();
        assert_eq!(content.version.content, "Three acts");
        assert_eq!(Some(content.version.id), archived.promoted_version_id);
    }

    #[test]
    fn test_secondary_reviewer_must_be_independent() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);

        let entry = workflow
            .submit("t1", SubmitDraft::new("draft", "text").two_stage(true))
            .unwrap();
        let pending = workflow.approve("t1", &entry.id, &token(&entry), "alice").unwrap();

        let err = workflow
            .approve("t1", &entry.id, &token(&pending), "alice")
            .unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::ReviewerNotIndependent);

        // The secondary token survives the refused attempt.
        let entry = workflow.get("t1", &entry.id).unwrap();
        assert_eq!(entry.status, StagingStatus::AwaitingSecondary);
        workflow.approve("t1", &entry.id, &token(&entry), "bob").unwrap();
    }

    #[test]
    fn test_token_checks() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow.submit("t1", SubmitDraft::new("draft", "x")).unwrap();

        let err = workflow.approve("t1", &entry.id, "", "rev").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::MissingToken);

        let err = workflow.approve("t1", &entry.id, "forged", "rev").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::InvalidToken);

        let err = workflow.approve("t1", "missing", "forged", "rev").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::NotFound);

        let err = workflow.approve("t2", &entry.id, &token(&entry), "rev").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::NotFound);
    }

    #[test]
    fn test_tree_untouched_until_promotion() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow
            .submit("t1", SubmitDraft::new("outline", "beats").two_stage(true))
            .unwrap();

        let err = workflow.approve("t1", &entry.id, "forged", "alice").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::InvalidToken);
        assert!(store.list_children("t1", None).unwrap().is_empty());

        let pending = workflow.approve("t1", &entry.id, &token(&entry), "alice").unwrap();
        assert_eq!(pending.status, StagingStatus::AwaitingSecondary);
        assert!(store.list_children("t1", None).unwrap().is_empty());

        workflow.approve("t1", &entry.id, &token(&pending), "bob").unwrap();
        let roots: Vec<_> = store
            .list_children("t1", None)
            .unwrap()
            .into_iter()
            .map(|n| n.path)
            .collect();
        assert_eq!(roots, vec!["outline", "draft", "research", "asset", "staging"]);
        // Layout is not seeded a second time.
        assert!(!store.ensure_default_layout("t1", "u").unwrap());
    }

    #[test]
    fn test_failed_promotion_leaves_no_layout() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow.submit("t1", SubmitDraft::new("draft", "x")).unwrap();

        // Promotion fails after the layout folders were inserted.
        store
            .with_transaction(|conn| {
                let mut e = load_entry(conn, "t1", &entry.id)?.unwrap();
                e.suggested_path = "draft/a//b".into();
                save_entry(conn, &e)
            })
            .unwrap();

        let err = workflow.approve("t1", &entry.id, &token(&entry), "rev").unwrap_err();
        assert_eq!(err.code(), "invalid_path");
        assert!(store.list_children("t1", None).unwrap().is_empty());
        assert!(!store.layout_cache().is_initialized("t1"));
        assert_eq!(workflow.get("t1", &entry.id).unwrap().status, StagingStatus::Pending);
    }

    #[test]
    fn test_reject_is_terminal_and_replay_fails() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow.submit("t1", SubmitDraft::new("draft", "x")).unwrap();
        let tok = token(&entry);

        let rejected = workflow
            .reject("t1", &entry.id, &tok, "rev", "off-brief")
            .unwrap();
        assert_eq!(rejected.status, StagingStatus::Rejected);
        assert_eq!(rejected.metadata["rejection_reason"], "off-brief");
        assert_eq!(
            rejected.audit_trail.last().unwrap().note.as_deref(),
            Some("off-brief")
        );

        let err = workflow.approve("t1", &entry.id, &tok, "rev").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::InvalidToken);

        let err = workflow.approve("t1", &entry.id, "other", "rev").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::AlreadyResolved);

        let err = workflow
            .resubmit("t1", &entry.id, Resubmission::default(), "agent")
            .unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::AlreadyResolved);

        assert!(store.get_node_by_path("t1", &entry.suggested_path).is_err());
    }

    #[test]
    fn test_request_changes_then_resubmit() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow
            .submit("t1", SubmitDraft::new("draft", "rough").two_stage(true))
            .unwrap();
        let primary = token(&entry);
        let awaiting = workflow.approve("t1", &entry.id, &primary, "alice").unwrap();
        let secondary = token(&awaiting);

        let drafted = workflow
            .request_changes("t1", &entry.id, &secondary, "bob", "tighten the opening")
            .unwrap();
        assert_eq!(drafted.status, StagingStatus::Drafted);
        assert_eq!(drafted.resubmission_count, 1);
        assert!(drafted.active_token().is_none());
        assert!(drafted.primary_approved_by.is_none());
        assert!(drafted.consumed_tokens.contains(&primary));
        assert!(drafted.consumed_tokens.contains(&secondary));

        let err = workflow.approve("t1", &entry.id, &secondary, "bob").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::InvalidToken);
        let err = workflow.approve("t1", &entry.id, "fresh", "bob").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::InvalidState);

        let resubmitted = workflow
            .resubmit(
                "t1",
                &entry.id,
                Resubmission {
                    content: Some("polished".into()),
                    summary: Some("second pass".into()),
                },
                "agent",
            )
            .unwrap();
        assert_eq!(resubmitted.status, StagingStatus::Pending);
        assert_eq!(resubmitted.content, "polished");
        let fresh = token(&resubmitted);
        assert_ne!(fresh, primary);

        let err = workflow
            .resubmit("t1", &entry.id, Resubmission::default(), "agent")
            .unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::InvalidState);

        // Two independent approvals are needed again.
        let awaiting = workflow.approve("t1", &entry.id, &fresh, "carol").unwrap();
        let done = workflow
            .approve("t1", &entry.id, &token(&awaiting), "dave")
            .unwrap();
        assert_eq!(done.status, StagingStatus::Archived);
        let content = store
            .read_file("t1", done.promoted_node_id.as_deref().unwrap())
            .unwrap();
        assert_eq!(content.version.content, "polished");
        assert_eq!(content.version.summary, "second pass");
    }

    #[test]
    fn test_promotion_into_existing_file_adds_version() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);

        let first = workflow
            .submit("t1", SubmitDraft::new("draft", "one").titled("Chapter"))
            .unwrap();
        workflow.approve("t1", &first.id, &token(&first), "rev").unwrap();

        counters.reset(None);
        let second = workflow
            .submit("t1", SubmitDraft::new("draft", "two").titled("Chapter"))
            .unwrap();
        assert_eq!(first.suggested_path, second.suggested_path);
        let archived = workflow.approve("t1", &second.id, &token(&second), "rev").unwrap();

        let node_id = archived.promoted_node_id.unwrap();
        assert_eq!(store.get_history("t1", &node_id, None).unwrap().len(), 2);
        assert_eq!(store.read_file("t1", &node_id).unwrap().version.content, "two");
    }

    #[test]
    fn test_promotion_failure_rolls_back_transition() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow
            .submit("t1", SubmitDraft::new("draft", "x").titled("Blocked"))
            .unwrap();

        // A folder squats on the file's path.
        store.ensure_default_layout("t1", "u").unwrap();
        let draft = store.get_node_by_path("t1", "draft").unwrap();
        let filename = entry.suggested_name.clone();
        store
            .create_folder("t1", Some(draft.id.as_str()), &filename, None, "u")
            .unwrap();

        let err = workflow.approve("t1", &entry.id, &token(&entry), "rev").unwrap_err();
        assert_eq!(err.code(), "not_a_file");

        let reloaded = workflow.get("t1", &entry.id).unwrap();
        assert_eq!(reloaded.status, StagingStatus::Pending);
        assert!(reloaded.consumed_tokens.is_empty());
    }

    #[test]
    fn test_overdue_is_surfaced_not_enforced() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow.submit("t1", SubmitDraft::new("draft", "x")).unwrap();
        let drafted = workflow.submit("t1", SubmitDraft::new("draft", "y")).unwrap();
        workflow
            .request_changes("t1", &drafted.id, &token(&drafted), "rev", "redo")
            .unwrap();

        assert!(!workflow.is_overdue("t1", &entry.id).unwrap());
        let later = entry.sla_deadline + Duration::hours(1);
        let overdue = workflow.list_overdue_at("t1", later).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, entry.id);
        assert!(overdue[0].is_overdue(later));

        // Still approvable: deadlines are not enforced by default.
        force_deadline_past(&store, &entry.id);
        assert!(workflow.is_overdue("t1", &entry.id).unwrap());
        let approved = workflow.approve("t1", &entry.id, &token(&entry), "rev").unwrap();
        assert_eq!(approved.status, StagingStatus::Archived);
    }

    #[test]
    fn test_enforced_deadline_expires_token() {
        let mut settings = WorkspaceSettings::default();
        settings.staging.enforce_deadline = true;
        let store = WorkspaceStore::open_in_memory_with_settings(settings).unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let entry = workflow.submit("t1", SubmitDraft::new("draft", "x")).unwrap();

        force_deadline_past(&store, &entry.id);
        let err = workflow.approve("t1", &entry.id, &token(&entry), "rev").unwrap_err();
        assert_eq!(staging_code(err), StagingErrorCode::TokenExpired);
        assert_eq!(workflow.get("t1", &entry.id).unwrap().status, StagingStatus::Pending);
    }

    #[test]
    fn test_list_by_status() {
        let store = WorkspaceStore::open_in_memory().unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&store, &counters);
        let a = workflow.submit("t1", SubmitDraft::new("draft", "a")).unwrap();
        workflow.submit("t1", SubmitDraft::new("draft", "b")).unwrap();
        workflow.submit("t2", SubmitDraft::new("draft", "c")).unwrap();
        workflow.reject("t1", &a.id, &token(&a), "rev", "no").unwrap();

        assert_eq!(workflow.list_by_status("t1", None, 10, 0).unwrap().len(), 2);
        let pending = workflow
            .list_by_status("t1", Some(StagingStatus::Pending), 10, 0)
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content, "b");
        assert_eq!(workflow.list_by_status("t1", None, 1, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_reads_do_not_wait_for_writers() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("workspace.db");
        let settings = WorkspaceSettings {
            busy_timeout: std::time::Duration::from_millis(50),
            ..WorkspaceSettings::default()
        };
        let writer = WorkspaceStore::open_with_settings(&db, settings.clone()).unwrap();
        let reader = WorkspaceStore::open_with_settings(&db, settings).unwrap();
        let counters = SequenceCounter::new();
        let workflow = StagingWorkflow::new(&reader, &counters);
        let entry = workflow.submit("t1", SubmitDraft::new("draft", "x")).unwrap();

        // The writer holds the database write lock while the reader queries.
        writer
            .with_transaction(|_| {
                assert_eq!(workflow.get("t1", &entry.id).unwrap().id, entry.id);
                assert_eq!(workflow.list_by_status("t1", None, 10, 0).unwrap().len(), 1);
                assert!(workflow.list_overdue("t1").unwrap().is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            StagingStatus::Drafted,
            StagingStatus::Pending,
            StagingStatus::AwaitingSecondary,
            StagingStatus::Archived,
            StagingStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<StagingStatus>().unwrap(), status);
        }
        assert!("approved".parse::<StagingStatus>().is_err());
    }

    fn force_deadline_past(store: &WorkspaceStore, entry_id: &str) {
        store
            .with_transaction(|conn| {
                conn.execute(
                    "UPDATE staging_entries SET sla_deadline = '2000-01-01T00:00:00.000000Z'
                     WHERE id = ?1",
                    rusqlite::params![entry_id],
                )?;
                Ok(())
            })
            .unwrap();
    }
}
