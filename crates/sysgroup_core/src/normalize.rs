//! Canonical forms for metadata keys and values.
//!
//! Source documents spell the same identity fields many ways
//! (`managerUserId`, `fs-lab`, `Smith Lab`, `smith_lab`). Keys keep only
//! underscores and values keep only hyphens, so exact hash lookups replace
//! regex searches.

/// Normalize a metadata key/value pair. Missing inputs become empty strings.
pub fn normalize(key: Option<&str>, value: Option<&str>) -> (String, String) {
    (
        normalize_key(key.unwrap_or_default()),
        normalize_value(value.unwrap_or_default()),
    )
}

/// Lowercase, trim, `-` → `_`.
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase().trim().replace('-', "_")
}

/// Lowercase, trim, `_` → `-`, and collapse `"<name> lab..."` into `"<name>-lab"`.
pub fn normalize_value(value: &str) -> String {
    let value = value.to_lowercase().trim().replace('_', "-");

    let mut tokens = value.split_whitespace();
    if let (Some(first), Some(second), None) = (tokens.next(), tokens.next(), tokens.next()) {
        if second.starts_with("lab") {
            return format!("{first}-lab");
        }
    }

    value
}
