//! Boolean flags arriving as strings from configuration or request payloads.

use crate::error::{CoreError, Result};

/// Parse a textual boolean flag.
///
/// Only `true` and `false` are accepted (case-insensitive, surrounding
/// whitespace ignored). Numeric strings such as `"1"` are rejected; callers
/// holding a native integer decide its truthiness themselves.
pub fn parse_bool_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(CoreError::invalid_boolean(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_flag() {
        assert!(parse_bool_flag("true").unwrap());
        assert!(parse_bool_flag(" TRUE ").unwrap());
        assert!(!parse_bool_flag("False").unwrap());
        assert!(parse_bool_flag("1").is_err());
        assert!(parse_bool_flag("yes").is_err());
        assert!(parse_bool_flag("").is_err());
    }
}
