//! Error type reported by module lifecycle methods.

/// Failure reported by a module from `init`, `start` or `stop`.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The operation failed for a module-specific reason.
    #[error("{0}")]
    Failed(String),

    /// The module rejected its configuration.
    #[error("invalid module configuration: {0}")]
    InvalidConfiguration(String),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LifecycleError {
    /// Build a [`LifecycleError::Failed`] from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        LifecycleError::Failed(message.into())
    }
}

/// Result type for module lifecycle methods.
pub type LifecycleResult = Result<(), LifecycleError>;
