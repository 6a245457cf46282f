//! Error types for the connection pool

use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by collaborator code (factories and resource close).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Timed out after {0:?} waiting for a pooled resource")]
    Timeout(Duration),

    #[error("Resource failed validation on reuse")]
    ResourceInvalid,

    #[error("Failed to create resource: {0}")]
    CreationFailed(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
