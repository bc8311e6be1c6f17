//! Error conversion helpers for store operations
//!
//! Provides an extension trait for attaching context to foreign errors.

use crate::application::{ApplicationError, ApplicationResult};

/// Extension trait for converting foreign results to `ApplicationResult` with context.
pub trait ResultExt<T> {
    /// Add context to a store error.
    ///
    /// # Example
    /// ```ignore
    /// conn.execute(sql, params)
    ///     .with_context(|| format!("insert component {}", name))?;
    /// ```
    fn with_context<F>(self, context: F) -> ApplicationResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<F>(self, context: F) -> ApplicationResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: context(),
            source: Box::new(e),
        })
    }
}
