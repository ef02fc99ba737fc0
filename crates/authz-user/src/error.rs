//! Authorization error types.
//!
//! Rule evaluation itself never fails: every outcome is a
//! [`Decision`](crate::engine::Decision). The errors here cover building the
//! inputs to evaluation (methods, contexts) and wiring the provider chain.

/// Errors that can occur while preparing an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// The request method is not one the method mask can represent.
    #[error("Invalid method: {method}")]
    InvalidMethod {
        /// The method token that could not be recognised.
        method: String,
    },

    /// No authenticated user identity was supplied.
    #[error("Missing user: {message}")]
    MissingUser {
        /// Description of what was missing.
        message: String,
    },

    /// The authorization configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthzError {
    /// Creates a new `InvalidMethod` error.
    #[must_use]
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            method: method.into(),
        }
    }

    /// Creates a new `MissingUser` error.
    #[must_use]
    pub fn missing_user(message: impl Into<String>) -> Self {
        Self::MissingUser {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the error was caused by request data rather than
    /// server setup.
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::InvalidMethod { .. } | Self::MissingUser { .. })
    }
}

impl From<crate::config::ConfigError> for AuthzError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
