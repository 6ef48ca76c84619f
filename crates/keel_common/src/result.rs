//! Common result and error types for the keel toolchain.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an internal error (a bug in keel), not a user-facing
/// problem. Problems in user source are reported as diagnostics.
pub type KeelResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in keel, not a user input problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("dependency missing from cache");
        assert_eq!(
            format!("{err}"),
            "internal compiler error: dependency missing from cache"
        );
    }

    #[test]
    fn err_path() {
        let r: KeelResult<i32> = Err(InternalError::new("test error"));
        assert_eq!(r.unwrap_err().message, "test error");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }
}
