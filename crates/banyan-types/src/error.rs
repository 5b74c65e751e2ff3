//! Unified error interface for Banyan crates.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! callers, logs, and tests can treat failures uniformly without matching
//! on concrete types.
//!
//! # Design
//!
//! - **Machine-readable codes** for programmatic handling and log grepping
//! - **Recoverability info** for retry decisions at call sites
//!
//! # Example
//!
//! ```
//! use banyan_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum StoreError {
//!     NotFound(String),
//!     Timeout,
//! }
//!
//! impl ErrorCode for StoreError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::NotFound(_) => "STORE_NOT_FOUND",
//!             Self::Timeout => "STORE_TIMEOUT",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Timeout)
//!     }
//! }
//!
//! let err = StoreError::Timeout;
//! assert_eq!(err.code(), "STORE_TIMEOUT");
//! assert!(err.is_recoverable());
//! ```

/// Unified error code interface.
///
/// # Code Format
///
/// Error codes are:
///
/// - **UPPER_SNAKE_CASE**: e.g. `"KERNEL_NOT_RUNNING"`
/// - **Namespace-prefixed**: `KERNEL_`, `REGISTRY_`, `COMPONENT_`, `DEP_`,
///   `CONFIG_`
/// - **Stable**: codes do not change once defined (API contract)
///
/// # Recoverability
///
/// An error is recoverable when retrying may succeed or the caller can take
/// corrective action: timeouts, transient lifecycle failures. It is not
/// recoverable for logic errors: duplicate names, permission denied,
/// circular dependencies.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying the failed operation may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows workspace conventions.
///
/// # Checks
///
/// 1. Code is non-empty
/// 2. Code starts with the expected prefix
/// 3. Code is UPPER_SNAKE_CASE
///
/// # Panics
///
/// Panics with a descriptive message if validation fails. Intended for
/// tests only.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{code}' must start with prefix '{expected_prefix}'",
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{code}' must be UPPER_SNAKE_CASE",
    );
}

/// Validates multiple error codes at once.
///
/// Use this to verify all variants of an error enum in a single test.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

/// Checks whether a string is UPPER_SNAKE_CASE.
fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn error_code_trait() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn assert_error_codes_all_variants() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_error_code_wrong_prefix() {
        assert_error_code(&TestError::Transient, "WRONG_");
    }

    #[test]
    fn upper_snake_case_rules() {
        assert!(is_upper_snake_case("KERNEL_NOT_RUNNING"));
        assert!(is_upper_snake_case("A_B_2"));

        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("kernel"));
        assert!(!is_upper_snake_case("_KERNEL"));
        assert!(!is_upper_snake_case("KERNEL_"));
        assert!(!is_upper_snake_case("KERNEL__X"));
    }
}
