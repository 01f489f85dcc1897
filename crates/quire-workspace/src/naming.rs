//! Artifact naming policy.
//!
//! Pure functions that decide where agent output lands in the tree and what
//! it is called. The only state is the [`SequenceCounter`], which callers own
//! and pass in explicitly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use quire_config::NamingConfig;
use serde::{Deserialize, Serialize};

use crate::validation::slugify;

/// Top-level folder an artifact type is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFolder {
    Outline,
    Draft,
    Research,
    Asset,
    Staging,
    Code,
    Data,
}

impl ArtifactFolder {
    pub const ALL: [ArtifactFolder; 7] = [
        Self::Outline,
        Self::Draft,
        Self::Research,
        Self::Asset,
        Self::Staging,
        Self::Code,
        Self::Data,
    ];

    /// Folder slug.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outline => "outline",
            Self::Draft => "draft",
            Self::Research => "research",
            Self::Asset => "asset",
            Self::Staging => "staging",
            Self::Code => "code",
            Self::Data => "data",
        }
    }

    /// Classify a declared artifact type. Unknown types are drafts.
    pub fn from_artifact_type(artifact_type: &str) -> Self {
        match artifact_type.trim().to_lowercase().as_str() {
            "outline" | "outlines" => Self::Outline,
            "research" | "notes" => Self::Research,
            "asset" | "assets" | "image" => Self::Asset,
            "staging" => Self::Staging,
            "code" | "script" => Self::Code,
            "data" | "dataset" => Self::Data,
            _ => Self::Draft,
        }
    }
}

impl std::fmt::Display for ArtifactFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-(session, agent) sequence numbers for generated file names.
///
/// Cosmetic only: sequence numbers never identify a node.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    counters: Mutex<HashMap<(String, String), u64>>,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the counter for the composite key. Starts at 1.
    pub fn next(&self, session: &str, agent: &str) -> u64 {
        let mut counters = self.counters.lock();
        let value = counters
            .entry((session.to_string(), agent.to_string()))
            .or_insert(0);
        *value += 1;
        *value
    }

    /// Reset one key, or every key when `key` is `None`.
    pub fn reset(&self, key: Option<(&str, &str)>) {
        let mut counters = self.counters.lock();
        match key {
            Some((session, agent)) => {
                counters.remove(&(session.to_string(), agent.to_string()));
            }
            None => counters.clear(),
        }
    }

    /// Current value without incrementing (0 when unused).
    pub fn current(&self, session: &str, agent: &str) -> u64 {
        self.counters
            .lock()
            .get(&(session.to_string(), agent.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Input to [`AutoNamingPolicy::generate_artifact_path`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    pub artifact_type: String,
    /// Explicit title; wins over anything derived from content.
    pub title: Option<String>,
    pub content: String,
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
}

/// Generated location for an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPath {
    pub folder: ArtifactFolder,
    /// Slash-joined directory, starting with the folder slug.
    pub directory: String,
    /// File name including extension.
    pub filename: String,
    /// `directory/filename`.
    pub path: String,
    pub sequence: u64,
}

/// Naming policy driven by `[naming]` configuration.
#[derive(Debug, Clone, Default)]
pub struct AutoNamingPolicy {
    config: NamingConfig,
}

impl AutoNamingPolicy {
    pub fn new(config: NamingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    pub fn resolve_folder(&self, artifact_type: &str) -> ArtifactFolder {
        ArtifactFolder::from_artifact_type(artifact_type)
    }

    /// Human-readable, filesystem-safe name with a timestamp suffix.
    pub fn suggest_name(
        &self,
        hint: Option<&str>,
        content: &str,
        artifact_type: &str,
        now: DateTime<Utc>,
    ) -> String {
        let title = self.title_slug(hint, content, artifact_type);
        format!("{}-{}", title, now.format(&self.config.timestamp_format))
    }

    /// Directory and file name for an artifact, consuming one sequence number.
    pub fn generate_artifact_path(
        &self,
        request: &ArtifactRequest,
        counters: &SequenceCounter,
        now: DateTime<Utc>,
    ) -> ArtifactPath {
        let folder = self.resolve_folder(&request.artifact_type);
        let agent = request
            .agent_id
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty());
        let session = request
            .session_id
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty());

        let mut directory = folder.as_str().to_string();
        if self.config.organize_by_agent
            && let Some(agent) = &agent
        {
            directory.push('/');
            directory.push_str(agent);
        }
        if self.config.organize_by_session
            && let Some(session) = &session
        {
            directory.push('/');
            directory.push_str(session);
        }

        let sequence = counters.next(
            session.as_deref().unwrap_or(""),
            agent.as_deref().unwrap_or(""),
        );
        let title = self.title_slug(request.title.as_deref(), &request.content, &request.artifact_type);
        let type_slug = match slugify(&request.artifact_type) {
            s if s.is_empty() => folder.as_str().to_string(),
            s => s,
        };

        let stem = self
            .config
            .filename_template
            .replace("{agent}", agent.as_deref().unwrap_or("agent"))
            .replace("{type}", &type_slug)
            .replace("{timestamp}", &now.format(&self.config.timestamp_format).to_string())
            .replace("{seq}", &sequence.to_string())
            .replace("{title}", &title);
        let stem = match slugify(&stem) {
            s if s.is_empty() => format!("{type_slug}-{sequence}"),
            s => s,
        };

        let filename = format!(
            "{}.{}",
            stem,
            infer_extension(&request.artifact_type, &request.content)
        );
        let path = format!("{directory}/{filename}");

        ArtifactPath {
            folder,
            directory,
            filename,
            path,
            sequence,
        }
    }

    fn title_slug(&self, hint: Option<&str>, content: &str, artifact_type: &str) -> String {
        let raw = hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .or_else(|| first_content_line(content))
            .unwrap_or_default();

        let slug = truncate_slug(&slugify(&raw), self.config.max_name_len);
        if !slug.is_empty() {
            return slug;
        }

        let placeholder = match slugify(artifact_type) {
            s if s.is_empty() => "artifact".to_string(),
            s => s,
        };
        format!("untitled-{placeholder}")
    }
}

/// First non-empty line with heading, quote and list markers removed.
fn first_content_line(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let stripped = strip_markers(line.trim());
        (!stripped.is_empty()).then(|| stripped.to_string())
    })
}

fn strip_markers(line: &str) -> &str {
    let line = line.trim_start_matches(['#', '>']).trim_start();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
        .unwrap_or(line);
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0
        && let Some(rest) = line[digits..].strip_prefix(". ")
    {
        return rest.trim();
    }
    line.trim()
}

fn truncate_slug(slug: &str, max: usize) -> String {
    if slug.chars().count() <= max {
        return slug.to_string();
    }
    let cut: String = slug.chars().take(max).collect();
    cut.trim_end_matches(['-', '.']).to_string()
}

/// File extension for an artifact, sniffing content for `code` and `data`.
pub fn infer_extension(artifact_type: &str, content: &str) -> &'static str {
    match ArtifactFolder::from_artifact_type(artifact_type) {
        ArtifactFolder::Code => sniff_code(content),
        ArtifactFolder::Data => sniff_data(content),
        ArtifactFolder::Asset if content.trim_start().starts_with("<svg") => "svg",
        ArtifactFolder::Asset => "txt",
        _ => "md",
    }
}

fn sniff_code(content: &str) -> &'static str {
    let trimmed = content.trim_start();
    if trimmed.starts_with("#!") {
        let shebang = trimmed.lines().next().unwrap_or_default();
        return if shebang.contains("python") {
            "py"
        } else if shebang.contains("node") {
            "js"
        } else {
            "sh"
        };
    }

    let has = |marker: &str| content.contains(marker);
    if has("fn ") && (has("let ") || has("use ") || has("pub ")) {
        "rs"
    } else if has("package main") || has("func ") {
        "go"
    } else if has("#include") {
        "c"
    } else if has("def ") || (has("import ") && has(":\n")) {
        "py"
    } else if has("interface ") && has(": string") {
        "ts"
    } else if has("function") || has("const ") || has("=>") {
        "js"
    } else if has("SELECT ") || has("CREATE TABLE") {
        "sql"
    } else {
        "txt"
    }
}

fn sniff_data(content: &str) -> &'static str {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return "json";
    }
    if trimmed.starts_with("<?xml") || trimmed.starts_with('<') {
        return "xml";
    }
    if trimmed.starts_with("---") {
        return "yaml";
    }

    let lines: Vec<&str> = trimmed.lines().filter(|l| !l.trim().is_empty()).take(5).collect();
    if let Some(first) = lines.first() {
        let commas = first.matches(',').count();
        if commas > 0 && lines.iter().all(|l| l.matches(',').count() == commas) {
            return "csv";
        }
        if lines.iter().all(|l| l.contains(": ")) {
            return "yaml";
        }
    }
    "txt"
}
