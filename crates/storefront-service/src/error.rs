//! Service error types.

use storefront_core::CoreError;
use storefront_store::StoreError;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Errors surfaced by the storefront services.
#[derive(Debug, thiserror::Error)]
pub enum StorefrontError {
    /// An order was placed with no items. Nothing was written.
    #[error("order has no items")]
    EmptyOrder,

    /// No user is signed in.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A write to the document store failed after retries.
    #[error("write to {path} failed: {source}")]
    StoreWrite {
        /// Path that was being written.
        path: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// Malformed input to a pricing or cart rule.
    #[error("validation failed: {0}")]
    Validation(#[from] CoreError),

    /// A subscription or read failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A service that writes in the background was created outside a
    /// tokio runtime.
    #[error("no tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

impl StorefrontError {
    /// Whether the same call may succeed if repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::StoreWrite { source, .. } | Self::Store(source) => source.is_retryable(),
            Self::EmptyOrder
            | Self::NotAuthenticated
            | Self::Validation(_)
            | Self::NoRuntime(_) => false,
        }
    }
}
