//! Python name validation utilities.
//!
//! Identifier rules follow Python's `str.isidentifier`: the first character
//! must be `_` or have the Unicode `XID_Start` property, the rest `XID_Continue`.
//! Keywords are identifiers under this rule, so a package called `match` is
//! accepted, just as the interpreter's own check accepts it.

use thiserror::Error;
use unicode_xid::UnicodeXID;

/// Error for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Invalid Python identifier name.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check whether `name` is a bare Python identifier.
pub fn is_identifier(name: &str) -> bool {
    validate_identifier(name).is_ok()
}

/// Validate that a string is a bare Python identifier.
///
/// # Examples
///
/// ```
/// use tugcheck_python::validation::validate_identifier;
///
/// assert!(validate_identifier("foo").is_ok());
/// assert!(validate_identifier("_private").is_ok());
/// assert!(validate_identifier("données").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("123foo").is_err());
/// assert!(validate_identifier("my-pkg").is_err());
/// ```
pub fn validate_identifier(name: &str) -> ValidationResult<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    };

    if first != '_' && !UnicodeXID::is_xid_start(first) {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "must start with letter or underscore".to_string(),
        });
    }

    if let Some(ch) = chars.find(|&ch| !UnicodeXID::is_xid_continue(ch)) {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: format!("invalid character: '{}'", ch),
        });
    }

    Ok(())
}

/// Check that every dot-separated component of a module id is an identifier.
pub fn is_valid_module_id(module: &str) -> bool {
    module.split('.').all(is_identifier)
}

/// Join module ids, accounting for a possibly empty parent.
pub fn module_join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod valid_identifiers {
        use super::*;

        #[test]
        fn simple_names() {
            assert!(is_identifier("foo"));
            assert!(is_identifier("x"));
            assert!(is_identifier("CamelCase"));
        }

        #[test]
        fn underscore_names() {
            assert!(is_identifier("_private"));
            assert!(is_identifier("_"));
            assert!(is_identifier("__init__"));
        }

        #[test]
        fn with_numbers() {
            assert!(is_identifier("foo123"));
            assert!(is_identifier("_2"));
        }

        #[test]
        fn unicode_letters() {
            assert!(is_identifier("données"));
            assert!(is_identifier("名前"));
        }

        #[test]
        fn keywords_are_identifiers() {
            assert!(is_identifier("class"));
            assert!(is_identifier("None"));
        }
    }

    mod invalid_identifiers {
        use super::*;

        #[test]
        fn empty_name() {
            let err = validate_identifier("").unwrap_err();
            assert!(matches!(err, ValidationError::InvalidName { .. }));
        }

        #[test]
        fn starts_with_number() {
            assert!(!is_identifier("123foo"));
            assert!(!is_identifier("1"));
        }

        #[test]
        fn invalid_characters() {
            assert!(!is_identifier("foo-bar"));
            assert!(!is_identifier("foo bar"));
            assert!(!is_identifier("foo.bar"));
            assert!(!is_identifier("site-packages"));
        }

        #[test]
        fn reason_names_offending_character() {
            let err = validate_identifier("my-pkg").unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid name 'my-pkg': invalid character: '-'"
            );
        }
    }

    mod module_ids {
        use super::*;

        #[test]
        fn dotted_ids() {
            assert!(is_valid_module_id("pkg"));
            assert!(is_valid_module_id("pkg.sub.mod"));
            assert!(!is_valid_module_id("pkg..mod"));
            assert!(!is_valid_module_id(""));
            assert!(!is_valid_module_id("pkg.1mod"));
        }

        #[test]
        fn join_with_empty_parent() {
            assert_eq!(module_join("", "a"), "a");
            assert_eq!(module_join("pkg", "a"), "pkg.a");
            assert_eq!(module_join("pkg.sub", "a"), "pkg.sub.a");
        }
    }
}
