//! Validation for names that end up in SQL text or on the file system.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AggregateError, AggregateResult};

/// Longest accepted identifier or partition name.
const MAX_NAME_LENGTH: usize = 128;

/// SQL identifier handling for rendered queries.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes a SQL identifier (table or column name).
    ///
    /// Identifiers are always double-quoted, so names with spaces, dashes or
    /// mixed case are preserved verbatim. Embedded double quotes are doubled.
    ///
    /// # Examples
    /// ```rust
    /// use tea_aggregates::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("revenue").unwrap(), "\"revenue\"");
    /// assert_eq!(SqlSecurity::escape_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// assert!(SqlSecurity::escape_identifier("  ").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> AggregateResult<String> {
        Self::validate_identifier(identifier)?;

        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates a SQL identifier without quoting it.
    pub fn validate_identifier(identifier: &str) -> AggregateResult<()> {
        if identifier.trim().is_empty() {
            return Err(AggregateError::Security(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_NAME_LENGTH {
            return Err(AggregateError::Security(format!(
                "SQL identifier too long (max {MAX_NAME_LENGTH} characters)"
            )));
        }

        if identifier.contains('\0') {
            return Err(AggregateError::Security(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }
}

/// Validates a partition name before it is used as a file stem.
///
/// Names must start with a letter, digit or underscore and contain only
/// letters, digits, underscores, dashes and dots, with no `..` sequence.
pub fn validate_partition_name(name: &str) -> AggregateResult<()> {
    static PARTITION_REGEX: Lazy<Regex> = Lazy::new(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$")
            .expect("Hard-coded regex pattern should be valid")
    });

    if name.len() > MAX_NAME_LENGTH {
        return Err(AggregateError::Security(format!(
            "Partition name too long (max {MAX_NAME_LENGTH} characters)"
        )));
    }

    if !PARTITION_REGEX.is_match(name) || name.contains("..") {
        return Err(AggregateError::Security(format!(
            "Invalid partition name: '{name}'"
        )));
    }

    Ok(())
}
