//! Sibling name resolution: `Base (n)Ext`.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_database::NodeStore;
use nimbus_entity::node::NodeKind;

/// Numbered candidates tried before the timestamp fallback.
const MAX_NUMBERED_ATTEMPTS: u32 = 1000;

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Trim and validate a user-supplied name.
pub fn normalize_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::validation(format!(
            "Name cannot be longer than {MAX_NAME_CHARS} characters"
        )));
    }
    if trimmed.contains(['/', '\\', '\0']) {
        return Err(AppError::validation("Name cannot contain '/', '\\' or NUL"));
    }
    Ok(trimmed.to_string())
}

/// Split a file name at its last dot. A leading dot is part of the base
/// (`.env` has no extension) and folders never have one.
pub fn split_extension(name: &str, kind: NodeKind) -> (&str, &str) {
    if kind.is_folder() {
        return (name, "");
    }
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// First name not in `taken`: the bare name, then `Base (1)Ext` up to
/// `Base (1000)Ext`, then a millisecond-timestamp suffix.
pub fn next_available_name(desired: &str, kind: NodeKind, taken: &HashSet<String>) -> String {
    if !taken.contains(desired) {
        return desired.to_string();
    }

    let (base, ext) = split_extension(desired, kind);
    for n in 1..=MAX_NUMBERED_ATTEMPTS {
        let candidate = format!("{base} ({n}){ext}");
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    format!("{base} ({}){ext}", Utc::now().timestamp_millis())
}

/// Resolve a free name among the live siblings of one kind under `parent_id`.
pub async fn available_name(
    nodes: &dyn NodeStore,
    owner_id: Uuid,
    parent_id: Option<Uuid>,
    kind: NodeKind,
    desired: &str,
) -> AppResult<String> {
    let taken: HashSet<String> = nodes
        .sibling_names(owner_id, parent_id, kind)
        .await?
        .into_iter()
        .collect();
    Ok(next_available_name(desired, kind, &taken))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bare_name_when_free() {
        assert_eq!(
            next_available_name("Report.pdf", NodeKind::File, &taken(&[])),
            "Report.pdf"
        );
    }

    #[test]
    fn test_numbered_before_extension() {
        let names = taken(&["Report.pdf"]);
        assert_eq!(
            next_available_name("Report.pdf", NodeKind::File, &names),
            "Report (1).pdf"
        );
        let names = taken(&["Report.pdf", "Report (1).pdf"]);
        assert_eq!(
            next_available_name("Report.pdf", NodeKind::File, &names),
            "Report (2).pdf"
        );
    }

    #[test]
    fn test_folders_and_dotfiles_keep_the_whole_name_as_base() {
        let names = taken(&["v1.2", ".env"]);
        assert_eq!(next_available_name("v1.2", NodeKind::Folder, &names), "v1.2 (1)");
        assert_eq!(next_available_name(".env", NodeKind::File, &names), ".env (1)");
        assert_eq!(split_extension("archive.tar.gz", NodeKind::File), ("archive.tar", ".gz"));
    }

    #[test]
    fn test_timestamp_fallback_after_exhaustion() {
        let mut names = taken(&["a.txt"]);
        for n in 1..=MAX_NUMBERED_ATTEMPTS {
            names.insert(format!("a ({n}).txt"));
        }
        let name = next_available_name("a.txt", NodeKind::File, &names);
        assert!(!names.contains(&name));
        assert!(name.starts_with("a ("));
        assert!(name.ends_with(").txt"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Notes  ").unwrap(), "Notes");
        assert!(normalize_name("   ").is_err());
        assert!(normalize_name("a/b").is_err());
        assert!(normalize_name(&"x".repeat(256)).is_err());
    }
}
