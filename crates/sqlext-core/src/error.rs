//! Error types for sqlext.
//!
//! Every fallible operation returns a [`SqlextError`] carrying an
//! [`ErrorCode`] that tells callers which class of failure occurred:
//! validation, decoding, or the execution layer.

use std::fmt;

/// Well-known error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ErrorCode {
    /// A required parameter (payload, WHERE clause) is missing.
    #[default]
    MissingParameter,
    /// A parameter is present but unusable (e.g. a table without an alias).
    InvalidParameter,
    /// An attribute bag could not be decoded.
    Decode,
    /// The execution layer reported a failure.
    Database,
    /// Configuration could not be loaded.
    Config,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameter => "InvalidParameter",
            Self::Decode => "Decode",
            Self::Database => "Database",
            Self::Config => "Config",
            Self::Internal => "Internal",
        }
    }

    /// Whether this code denotes a caller-side validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingParameter | Self::InvalidParameter)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by sqlext operations.
#[derive(Debug)]
pub struct SqlextError {
    /// The error code.
    pub code: ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for SqlextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqlextError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for SqlextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl SqlextError {
    /// Create a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // -- Convenience constructors --

    /// Required parameter missing.
    #[must_use]
    pub fn missing_parameter(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::MissingParameter, message)
    }

    /// Parameter present but invalid.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidParameter, message)
    }

    /// Attribute bag decoding failed.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Decode, message)
    }

    /// Execution layer failure.
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Database, message)
    }

    /// Configuration failure.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Config, message)
    }

    /// Internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Internal, message)
    }

    /// Whether this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.code.is_validation()
    }
}

/// Convenience result type for sqlext operations.
pub type SqlextResult<T> = Result<T, SqlextError>;
