// Typed errors with thiserror. Every failure is locally recoverable.
// Inline errors render next to the input that caused them; blocking ones raise a notice.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;

/// Storefront error types.
#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    #[error("{0}")]
    ResourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image error: {0}")]
    Image(String),
}

/// How the host should surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Inline message next to the offending control.
    Inline,
    /// Alert-style notice the user has to dismiss.
    Blocking,
}

impl StorefrontError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StorefrontError::InvalidInput(message.into())
    }

    pub fn severity(&self) -> Severity {
        match self {
            StorefrontError::InvalidInput(_) | StorefrontError::UnknownProduct(_) => {
                Severity::Inline
            }
            _ => Severity::Blocking,
        }
    }
}

impl From<serde_json::Error> for StorefrontError {
    fn from(err: serde_json::Error) -> Self {
        StorefrontError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for StorefrontError {
    fn from(err: image::ImageError) -> Self {
        StorefrontError::Image(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StorefrontError::invalid_input("Enter a valid offer");
        assert_eq!(err.to_string(), "Enter a valid offer");

        let err = StorefrontError::UnknownProduct(ProductId::new(42));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn severity_split() {
        assert_eq!(
            StorefrontError::invalid_input("x").severity(),
            Severity::Inline
        );
        assert_eq!(
            StorefrontError::ResourceUnavailable("camera".into()).severity(),
            Severity::Blocking
        );
    }
}
