//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the component tree rules.
/// These are independent of the store a tree was loaded from.
#[derive(Error, Debug)]
pub enum DomainError {
    /// A row needed to build a node is missing or ambiguous.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("subcomponent named {name} already exists in {parent_path}")]
    DuplicateName { name: String, parent_path: String },

    #[error("subcomponent named {name} does not exist in {parent_path}")]
    NotFound { name: String, parent_path: String },

    #[error("component handle no longer refers to a node in this tree")]
    StaleHandle,

    #[error("row source failed: {context}")]
    Source {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DomainError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a store-specific failure with context.
    pub fn source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Source {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Result type for tree operations.
pub type DomainResult<T> = Result<T, DomainError>;
