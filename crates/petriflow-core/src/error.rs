//! Error types for petriflow-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Dangling reference: arc {arc} {endpoint} '{id}' does not resolve")]
    DanglingReference {
        arc: String,
        endpoint: &'static str,
        id: String,
    },

    #[error("Rate expression error in '{expression}': {message}")]
    RateExpression { expression: String, message: String },

    #[error("Invalid net: {0}")]
    InvalidNet(String),

    #[error("Place not found: {0}")]
    PlaceNotFound(String),

    #[error("Transition not found: {0}")]
    TransitionNotFound(String),

    #[error("Invalid token value {value} for place {place}: {reason}")]
    InvalidTokens {
        place: String,
        value: f64,
        reason: String,
    },
}

impl Error {
    /// Build a rate expression error
    pub fn rate(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RateExpression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Build an invalid net error
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidNet(message.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
