//! Error types for Smile CDR admin API operations.
//!
//! Errors are categorized so callers can tell a missing remote entity
//! (which a refresh treats as "gone") from a broken connection or a
//! malformed payload.

use declarative::ValueError;
use std::fmt;

/// Result type alias for admin API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of admin API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request never got a usable answer.
    Transport,
    /// The server answered 404.
    NotFound,
    /// The server refused the request with another status.
    Rejected,
    /// A payload could not be decoded.
    Decode,
    /// A stored option could not be read as its declared type.
    Conversion,
    /// Bad settings or identifiers supplied by the user.
    Config,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => "Could not reach the Smile CDR admin API",
            Self::NotFound => "Remote entity not found",
            Self::Rejected => "Request rejected by the server",
            Self::Decode => "Unexpected response payload",
            Self::Conversion => "Stored option has an unexpected format",
            Self::Config => "Invalid configuration",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transport => "Check the base URL and that the admin JSON endpoint is listening",
            Self::NotFound => "The entity may have been removed outside this tool; refresh state",
            Self::Rejected => "Check the credentials and the entity's current state on the server",
            Self::Decode => "Check that the base URL points at the admin JSON API",
            Self::Conversion => "Fix the option on the server or in the module configuration",
            Self::Config => "Check the provider settings and resource identifiers",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the admin API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request failed before a status was received.
    #[error("{method} {uri}: {message}")]
    Network {
        /// HTTP method.
        method: String,
        /// Full request URI.
        uri: String,
        /// Underlying failure.
        message: String,
    },

    /// The server answered with a status the call does not accept.
    #[error("{method} {uri}: unexpected status {status}")]
    Status {
        /// HTTP method.
        method: String,
        /// Full request URI.
        uri: String,
        /// Status code received.
        status: u16,
    },

    /// The response body could not be read.
    #[error("reading response from {uri}: {message}")]
    Body {
        /// Full request URI.
        uri: String,
        /// Underlying failure.
        message: String,
    },

    /// A JSON payload did not match the expected shape.
    #[error("decoding {what}: {source}")]
    Decode {
        /// What was being decoded.
        what: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A module option could not be converted.
    #[error(transparent)]
    Conversion(#[from] ValueError),

    /// An import identifier did not match the kind's format.
    #[error("invalid import id {id:?} for {kind}; expected {expected}")]
    InvalidImportId {
        /// Resource kind.
        kind: String,
        /// Identifier given.
        id: String,
        /// Accepted format.
        expected: String,
    },

    /// Invalid settings.
    #[error("{0}")]
    Config(String),
}

impl Error {
    /// Create a status error.
    pub fn status(method: impl Into<String>, uri: impl Into<String>, status: u16) -> Self {
        Self::Status {
            method: method.into(),
            uri: uri.into(),
            status,
        }
    }

    /// Create a decode error.
    pub fn decode(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            what: what.into(),
            source,
        }
    }

    /// Create an import id error.
    pub fn invalid_import_id(
        kind: impl Into<String>,
        id: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidImportId {
            kind: kind.into(),
            id: id.into(),
            expected: expected.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } | Error::Body { .. } => ErrorCategory::Transport,
            Error::Status { status: 404, .. } => ErrorCategory::NotFound,
            Error::Status { .. } => ErrorCategory::Rejected,
            Error::Decode { .. } => ErrorCategory::Decode,
            Error::Conversion(_) => ErrorCategory::Conversion,
            Error::InvalidImportId { .. } | Error::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether the server reported the entity as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Status code, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_category() {
        let err = Error::status("GET", "http://localhost:9000/module-config/Master/x", 404);
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_conflict_is_rejected() {
        let err = Error::status("POST", "/user-management/Master/local_security", 409);
        assert_eq!(err.category(), ErrorCategory::Rejected);
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("409"));
    }

    #[test]
    fn test_conversion_from_value_error() {
        let err: Error = ValueError::Conversion {
            key: "port".into(),
            value: "abc".into(),
            expected: declarative::ValueType::Integer,
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Conversion);
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_import_id_message() {
        let err = Error::invalid_import_id("user", "Master", "{nodeId}/{moduleId}/{pid}");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.to_string().contains("{nodeId}/{moduleId}/{pid}"));
    }

    #[test]
    fn test_category_text() {
        assert!(!ErrorCategory::Transport.description().is_empty());
        assert!(!ErrorCategory::NotFound.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Decode).contains("payload"));
    }
}
