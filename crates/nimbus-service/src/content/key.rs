//! Object key derivation.
//!
//! Keys are derived from the owner and node ids only. The display name
//! contributes at most a sanitized extension, so renames never touch stored
//! content and user-controlled names cannot traverse or collide.

use uuid::Uuid;

/// Longest extension carried into a key.
const MAX_EXTENSION_LEN: usize = 16;

/// Build the key for a node's content: `files/{owner}/{node}[.{ext}]`.
pub fn generate_key(owner_id: Uuid, node_id: Uuid, extension: Option<&str>) -> String {
    match extension {
        Some(ext) if !ext.is_empty() => format!("files/{owner_id}/{node_id}.{ext}"),
        _ => format!("files/{owner_id}/{node_id}"),
    }
}

/// Lower-cased extension after the last dot, if it is short and alphanumeric.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Whether `key` is one [`generate_key`] could have produced for this node.
pub fn key_belongs_to(key: &str, owner_id: Uuid, node_id: Uuid) -> bool {
    let stem = generate_key(owner_id, node_id, None);
    match key.strip_prefix(stem.as_str()) {
        Some("") => true,
        Some(rest) => rest.strip_prefix('.').is_some_and(is_key_extension),
        None => false,
    }
}

fn is_key_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_independent_of_display_name() {
        let owner = Uuid::new_v4();
        let node = Uuid::new_v4();
        assert_eq!(
            generate_key(owner, node, extension_of("Quarterly Report.PDF").as_deref()),
            format!("files/{owner}/{node}.pdf")
        );
        assert_eq!(
            generate_key(owner, node, extension_of("README").as_deref()),
            format!("files/{owner}/{node}")
        );
    }

    #[test]
    fn test_hostile_extensions_are_dropped() {
        assert_eq!(extension_of("a.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("evil./../../etc"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("x.averyveryverylongextension"), None);
    }

    #[test]
    fn test_key_belongs_to_its_node_only() {
        let owner = Uuid::new_v4();
        let node = Uuid::new_v4();
        assert!(key_belongs_to(&generate_key(owner, node, Some("pdf")), owner, node));
        assert!(key_belongs_to(&generate_key(owner, node, None), owner, node));
        assert!(!key_belongs_to(&generate_key(owner, Uuid::new_v4(), None), owner, node));
        assert!(!key_belongs_to(&format!("files/{owner}/{node}/../x"), owner, node));
        assert!(!key_belongs_to(&format!("files/{owner}/{node}2"), owner, node));
    }
}
