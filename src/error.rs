use std::sync::Arc;

/// Error handed to every caller waiting on a key that could not be loaded.
///
/// A single `LoadError` is usually shared by all the callers of a batch, hence the `Arc`s and the
/// cheap `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The batch function failed as a whole; every key of the batch gets this error.
    #[error("batch fetch failed: {0:#}")]
    Fetch(Arc<anyhow::Error>),
    /// The batch function reported a failure for this key only.
    #[error("key could not be loaded: {0:#}")]
    Key(Arc<anyhow::Error>),
    #[error("batch function returned {got} results for {expected} keys")]
    ContractViolation { expected: usize, got: usize },
    /// The batch was dropped before its results were delivered, e.g. because the batch function
    /// panicked.
    #[error("batch was abandoned before its results were delivered")]
    Abandoned,
}

impl LoadError {
    pub(crate) fn fetch(error: anyhow::Error) -> Self {
        LoadError::Fetch(Arc::new(error))
    }

    pub(crate) fn key(error: anyhow::Error) -> Self {
        LoadError::Key(Arc::new(error))
    }
}
