//! Staging command - submit and review drafts.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use quire_workspace::{
    Resubmission, SequenceCounter, StagingEntry, StagingStatus, StagingWorkflow, SubmitDraft,
};

use super::{Context, print_json, read_input, short_id, truncate};

/// Arguments for the staging command.
#[derive(Args, Debug)]
pub struct StagingArgs {
    #[command(subcommand)]
    pub command: StagingCommand,
}

#[derive(Subcommand, Debug)]
pub enum StagingCommand {
    /// Submit a draft for review
    Submit {
        /// Artifact type (outline, draft, research, asset, code, data, ...)
        #[arg(long = "type", default_value = "draft")]
        artifact_type: String,

        /// Title used to name the file
        #[arg(short, long)]
        title: Option<String>,

        /// Draft content (default: read from --file or stdin)
        #[arg(short, long, conflicts_with = "file")]
        content: Option<String>,

        /// Read content from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Summary recorded on the promoted version
        #[arg(short, long)]
        summary: Option<String>,

        /// Submitting agent id
        #[arg(long)]
        agent: Option<String>,

        /// Session the draft belongs to
        #[arg(long)]
        session: Option<String>,

        /// Command that produced the draft
        #[arg(long = "source-command")]
        source_command: Option<String>,

        /// Require a second, independent approval
        #[arg(long)]
        two_stage: bool,
    },

    /// Approve with the active review token
    Approve {
        /// Entry id
        id: String,

        /// Review token
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        token: String,
    },

    /// Reject with the active review token
    Reject {
        /// Entry id
        id: String,

        /// Review token
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        token: String,

        /// Reason recorded in the audit trail
        #[arg(short, long)]
        reason: String,
    },

    /// Send the draft back to its author
    RequestChanges {
        /// Entry id
        id: String,

        /// Review token
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        token: String,

        /// Requested changes
        #[arg(short, long)]
        reason: String,
    },

    /// Return a drafted entry to review
    Resubmit {
        /// Entry id
        id: String,

        /// Replacement content
        #[arg(short, long, conflicts_with = "file")]
        content: Option<String>,

        /// Read replacement content from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Replacement summary
        #[arg(short, long)]
        summary: Option<String>,
    },

    /// List entries
    List {
        /// Filter by status (drafted, pending, awaiting_secondary, archived, rejected)
        #[arg(long)]
        status: Option<String>,

        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Entries to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show one entry with its audit trail
    Show {
        /// Entry id
        id: String,
    },

    /// List entries past their review deadline
    Overdue,
}

/// Run the staging command.
pub fn run(args: StagingArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let counters = SequenceCounter::new();
    let workflow = StagingWorkflow::new(&store, &counters);
    let tenant = ctx.tenant.as_str();

    match args.command {
        StagingCommand::Submit {
            artifact_type,
            title,
            content,
            file,
            summary,
            agent,
            session,
            source_command,
            two_stage,
        } => {
            let draft = SubmitDraft {
                title,
                summary,
                source_agent_id: agent,
                session_id: session,
                source_command,
                requires_secondary: two_stage.then_some(true),
                ..SubmitDraft::new(artifact_type, read_input(content, file)?)
            };
            let entry = workflow.submit(tenant, draft)?;
            report(ctx, &entry, "Submitted")
        }
        StagingCommand::Approve { id, token } => {
            let entry = workflow.approve(tenant, &id, &token, &ctx.actor)?;
            let verb = match entry.status {
                StagingStatus::AwaitingSecondary => "Primary approval recorded",
                _ => "Approved and promoted",
            };
            report(ctx, &entry, verb)
        }
        StagingCommand::Reject { id, token, reason } => {
            let entry = workflow.reject(tenant, &id, &token, &ctx.actor, &reason)?;
            report(ctx, &entry, "Rejected")
        }
        StagingCommand::RequestChanges { id, token, reason } => {
            let entry = workflow.request_changes(tenant, &id, &token, &ctx.actor, &reason)?;
            report(ctx, &entry, "Changes requested")
        }
        StagingCommand::Resubmit {
            id,
            content,
            file,
            summary,
        } => {
            let content = match (content, file) {
                (None, None) => None,
                (content, file) => Some(read_input(content, file)?),
            };
            let entry = workflow.resubmit(
                tenant,
                &id,
                Resubmission { content, summary },
                &ctx.actor,
            )?;
            report(ctx, &entry, "Resubmitted")
        }
        StagingCommand::List {
            status,
            limit,
            offset,
        } => {
            let status = status
                .as_deref()
                .map(str::parse::<StagingStatus>)
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let entries = workflow.list_by_status(tenant, status, limit, offset)?;
            list(ctx, &entries, "Staging entries")
        }
        StagingCommand::Show { id } => {
            let entry = workflow.get(tenant, &id)?;
            if ctx.json_output {
                return print_json(&entry);
            }
            show(&entry);
            Ok(())
        }
        StagingCommand::Overdue => {
            let entries = workflow.list_overdue(tenant)?;
            list(ctx, &entries, "Overdue entries")
        }
    }
}

fn report(ctx: &Context, entry: &StagingEntry, verb: &str) -> Result<()> {
    if ctx.json_output {
        return print_json(entry);
    }
    let green = Style::new().green();
    let dim = Style::new().dim();
    println!(
        "{} {} {} {}",
        green.apply_to("✓"),
        verb,
        entry.id,
        dim.apply_to(format!("[{}]", entry.status))
    );
    println!("  {} {}", dim.apply_to("Path:"), entry.suggested_path);
    if let Some(token) = entry.active_token() {
        println!("  {} {}", dim.apply_to("Token:"), token);
    }
    if let Some(node_id) = &entry.promoted_node_id {
        println!("  {} {}", dim.apply_to("Node:"), node_id);
    }
    Ok(())
}

fn list(ctx: &Context, entries: &[StagingEntry], title: &str) -> Result<()> {
    if ctx.json_output {
        return print_json(&entries);
    }
    let dim = Style::new().dim();
    println!("{}", style(title).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    if entries.is_empty() {
        println!("{}", dim.apply_to("No entries"));
    }
    for entry in entries {
        println!(
            "{} {:<18} {}  {}",
            dim.apply_to(format!("[{}]", short_id(&entry.id))),
            entry.status,
            entry.suggested_path,
            dim.apply_to(truncate(&entry.summary, 30))
        );
    }
    Ok(())
}

fn show(entry: &StagingEntry) {
    let dim = Style::new().dim();
    println!("{}", style(format!("Staging entry {}", entry.id)).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  {} {}", dim.apply_to("Status:"), entry.status);
    println!("  {} {}", dim.apply_to("Path:"), entry.suggested_path);
    println!("  {} {}", dim.apply_to("Summary:"), entry.summary);
    println!("  {} {}", dim.apply_to("Two-stage:"), entry.requires_secondary);
    println!(
        "  {} {}",
        dim.apply_to("Deadline:"),
        entry.sla_deadline.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(token) = entry.active_token() {
        println!("  {} {}", dim.apply_to("Token:"), token);
    }
    println!();
    println!("{}", style("Audit trail").bold());
    for record in &entry.audit_trail {
        let note = record
            .note
            .as_deref()
            .map(|n| format!(" - {n}"))
            .unwrap_or_default();
        println!(
            "  {}  {:?} by {} -> {}{}",
            record.at.format("%Y-%m-%d %H:%M:%S"),
            record.action,
            record.actor,
            record.status,
            note
        );
    }
}
