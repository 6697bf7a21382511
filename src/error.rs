// src/error.rs
// =============================================================================
// Typed errors for the plugin core.
//
// The CLI side of the program uses anyhow (any error, plus context), but the
// plugin engine has a couple of failures that callers may want to match on:
// - a plugin title that is too long to fit the status line
// - a check asking for an asset when no asset manager was wired in
//
// thiserror generates the Display and Error impls from the attributes below.
// =============================================================================

use thiserror::Error;

/// Longest title a plugin may carry (it prefixes every status line).
pub const MAX_TITLE_LEN: usize = 10;

/// Result type alias for plugin-core operations.
pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Plugin title longer than MAX_TITLE_LEN characters
    #[error("plugin title '{title}' is {len} characters long (max {max})", max = MAX_TITLE_LEN)]
    TitleTooLong { title: String, len: usize },

    /// get_asset() called from a check context with no asset manager
    #[error("no asset manager configured")]
    NoAssetManager,

    /// URL could not be parsed
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Bad value in the audit configuration
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_too_long_message() {
        let err = AuditError::TitleTooLong {
            title: "VeryLongTitle".to_string(),
            len: 13,
        };
        assert_eq!(
            err.to_string(),
            "plugin title 'VeryLongTitle' is 13 characters long (max 10)"
        );
    }

    #[test]
    fn test_no_asset_manager_message() {
        assert_eq!(
            AuditError::NoAssetManager.to_string(),
            "no asset manager configured"
        );
    }
}
