//! Name validation and slug/path helpers.
//!
//! Slugs are the path segments of the materialized path. They contain only
//! lowercase alphanumerics plus `-`, `_` and `.`, never start or end with a
//! separator, and never contain `/`.

use crate::error::ValidationError;

/// Maximum display name length, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Validate a display name and return it trimmed.
pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong { max: MAX_NAME_LEN });
    }
    if trimmed.contains('/') {
        return Err(ValidationError::NameContainsSeparator(trimmed.to_string()));
    }
    Ok(trimmed)
}

/// Convert a display name into a path segment.
///
/// Returns an empty string when the name has no usable characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug.trim_matches(|c| c == '.' || c == '-').to_string()
}

/// Slugify a validated name, failing when nothing url-safe remains.
pub fn slug_for(name: &str) -> Result<String, ValidationError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ValidationError::UnsluggableName(name.to_string()));
    }
    Ok(slug)
}

/// Materialized path of a child of `parent_path`.
pub fn join_path(parent_path: Option<&str>, slug: &str) -> String {
    match parent_path {
        Some(parent) => format!("{parent}/{slug}"),
        None => slug.to_string(),
    }
}

/// Split a slash-separated workspace path into segments.
///
/// Leading and trailing slashes are ignored; empty inner segments are
/// rejected.
pub fn split_path(path: &str) -> Result<Vec<&str>, ValidationError> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidPath(path.to_string()));
    }
    let segments: Vec<&str> = trimmed.split('/').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ValidationError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}
