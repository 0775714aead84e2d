//! Configuration name rules

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Longest accepted configuration name
pub const MAX_NAME_LENGTH: usize = 250;

/// Characters that may never appear in a configuration name
static ILLEGAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[:?*<>"'/\\]"#).expect("name regex is valid"));

/// Check a configuration name, returning the reason it is rejected
pub fn check_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if !name.contains('.') {
        return Err("name must be namespaced with a '.'".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(format!(
            "name exceeds the maximum length of {} characters",
            MAX_NAME_LENGTH
        ));
    }
    if let Some(found) = ILLEGAL_CHARS.find(name) {
        return Err(format!("name contains the illegal character '{}'", found.as_str()));
    }
    Ok(())
}

/// Validate a configuration name
pub fn validate_name(name: &str) -> Result<()> {
    check_name(name).map_err(|reason| Error::invalid_name(name, reason))
}

/// Split a name into its owner prefix (text before the first '.')
pub fn owner(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
