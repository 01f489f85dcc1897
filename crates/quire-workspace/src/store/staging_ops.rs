//! Staging entry persistence.
//!
//! The workflow logic lives in [`crate::staging`]; these helpers only map
//! entries to and from rows. All of them expect to run inside a transaction.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::staging::{StagingEntry, StagingStatus};

use super::{fmt_ts, get_json, get_ts, parse_enum};

const ENTRY_COLUMNS: &str = "id, tenant_id, file_type, suggested_name, suggested_folder, \
    suggested_path, content, summary, source_agent_id, source_agent_name, source_command, \
    session_id, status, requires_secondary, primary_reviewer_id, secondary_reviewer_id, \
    primary_token, secondary_token, primary_approved_by, consumed_tokens, sla_deadline, \
    submitted_at, last_transition_at, audit_trail, resubmission_count, metadata, \
    promoted_node_id, promoted_version_id";

pub(crate) fn insert_entry(conn: &Connection, entry: &StagingEntry) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO staging_entries ({ENTRY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)"
        ),
        params![
            entry.id,
            entry.tenant_id,
            entry.file_type,
            entry.suggested_name,
            entry.suggested_folder,
            entry.suggested_path,
            entry.content,
            entry.summary,
            entry.source_agent_id,
            entry.source_agent_name,
            entry.source_command,
            entry.session_id,
            entry.status.as_str(),
            entry.requires_secondary,
            entry.primary_reviewer_id,
            entry.secondary_reviewer_id,
            entry.primary_token,
            entry.secondary_token,
            entry.primary_approved_by,
            serde_json::to_string(&entry.consumed_tokens)?,
            fmt_ts(&entry.sla_deadline),
            fmt_ts(&entry.submitted_at),
            fmt_ts(&entry.last_transition_at),
            serde_json::to_string(&entry.audit_trail)?,
            entry.resubmission_count,
            serde_json::to_string(&entry.metadata)?,
            entry.promoted_node_id,
            entry.promoted_version_id,
        ],
    )?;
    Ok(())
}

/// Persist every mutable field of an existing entry.
pub(crate) fn save_entry(conn: &Connection, entry: &StagingEntry) -> Result<()> {
    conn.execute(
        "UPDATE staging_entries SET
            content = ?3, summary = ?4, status = ?5, primary_token = ?6,
            secondary_token = ?7, primary_approved_by = ?8, consumed_tokens = ?9,
            sla_deadline = ?10, last_transition_at = ?11, audit_trail = ?12,
            resubmission_count = ?13, metadata = ?14, promoted_node_id = ?15,
            promoted_version_id = ?16
         WHERE tenant_id = ?1 AND id = ?2",
        params![
            entry.tenant_id,
            entry.id,
            entry.content,
            entry.summary,
            entry.status.as_str(),
            entry.primary_token,
            entry.secondary_token,
            entry.primary_approved_by,
            serde_json::to_string(&entry.consumed_tokens)?,
            fmt_ts(&entry.sla_deadline),
            fmt_ts(&entry.last_transition_at),
            serde_json::to_string(&entry.audit_trail)?,
            entry.resubmission_count,
            serde_json::to_string(&entry.metadata)?,
            entry.promoted_node_id,
            entry.promoted_version_id,
        ],
    )?;
    Ok(())
}

pub(crate) fn load_entry(
    conn: &Connection,
    tenant_id: &str,
    entry_id: &str,
) -> Result<Option<StagingEntry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM staging_entries WHERE tenant_id = ?1 AND id = ?2");
    Ok(conn
        .query_row(&sql, params![tenant_id, entry_id], row_to_entry)
        .optional()?)
}

/// Newest first, optionally filtered by status.
pub(crate) fn list_entries(
    conn: &Connection,
    tenant_id: &str,
    status: Option<StagingStatus>,
    limit: usize,
    offset: usize,
) -> Result<Vec<StagingEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM staging_entries
         WHERE tenant_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY submitted_at DESC, rowid DESC
         LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(
            params![
                tenant_id,
                status.map(|s| s.as_str()),
                limit as i64,
                offset as i64
            ],
            row_to_entry,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// Entries under review whose deadline is before `at`, oldest deadline first.
pub(crate) fn list_overdue_entries(
    conn: &Connection,
    tenant_id: &str,
    at: DateTime<Utc>,
) -> Result<Vec<StagingEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM staging_entries
         WHERE tenant_id = ?1 AND status IN ('pending', 'awaiting_secondary')
           AND sla_deadline < ?2
         ORDER BY sla_deadline, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params![tenant_id, fmt_ts(&at)], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<StagingEntry> {
    Ok(StagingEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        file_type: row.get(2)?,
        suggested_name: row.get(3)?,
        suggested_folder: row.get(4)?,
        suggested_path: row.get(5)?,
        content: row.get(6)?,
        summary: row.get(7)?,
        source_agent_id: row.get(8)?,
        source_agent_name: row.get(9)?,
        source_command: row.get(10)?,
        session_id: row.get(11)?,
        status: parse_enum(row, 12)?,
        requires_secondary: row.get(13)?,
        primary_reviewer_id: row.get(14)?,
        secondary_reviewer_id: row.get(15)?,
        primary_token: row.get(16)?,
        secondary_token: row.get(17)?,
        primary_approved_by: row.get(18)?,
        consumed_tokens: get_typed_json(row, 19)?,
        sla_deadline: get_ts(row, 20)?,
        submitted_at: get_ts(row, 21)?,
        last_transition_at: get_ts(row, 22)?,
        audit_trail: get_typed_json(row, 23)?,
        resubmission_count: row.get(24)?,
        metadata: get_json(row, 25)?,
        promoted_node_id: row.get(26)?,
        promoted_version_id: row.get(27)?,
    })
}

fn get_typed_json<T: DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
