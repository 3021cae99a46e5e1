//! Error types for the news desk.
//!
//! Provider failures are normally absorbed where they happen (key rotation,
//! fallback provider, next scheduled tick). The variants here exist so that
//! call sites can tell those cases apart and log them with context.

use crate::models::{ArticleId, ArticleState};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid settings detected during validation.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        /// The settings key at fault, when known (e.g. `scoring.weights`).
        key: Option<String>,
    },

    /// An article with this URL is already stored.
    #[error("duplicate url: {0}")]
    DuplicateUrl(String),

    #[error("article not found: {0}")]
    NotFound(ArticleId),

    /// The requested move is not an edge of the workflow graph.
    #[error("invalid transition for article {id}: {from} -> {to}")]
    InvalidTransition {
        id: ArticleId,
        from: ArticleState,
        to: ArticleState,
    },

    /// The article has no text that could be shown or published.
    #[error("article {0} has no displayable text")]
    MissingText(ArticleId),

    /// A provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}")]
    ProviderStatus { provider: &'static str, status: u16 },

    /// A provider answered successfully but the payload was unusable.
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// No credentials are configured for a provider.
    #[error("{0} is not configured")]
    Unconfigured(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("settings file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// True for failures that should trigger key rotation or a fallback
    /// provider rather than abort the enclosing job.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ProviderStatus { .. }
                | Error::Provider { .. }
                | Error::Http(_)
                | Error::Serialization(_)
        )
    }
}
