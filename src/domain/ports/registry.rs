//! Service Registry Port
//!
//! Defines the interface to the coordination service that holds the
//! advertised records. Implementations may speak etcd or keep records in memory.

use crate::domain::value_objects::RegistryKey;
use async_trait::async_trait;
use std::time::Duration;

/// Errors reported by a registry session.
///
/// The registration loop only needs to tell a missing key apart from
/// everything else: a missing key is a lost race with TTL expiry, anything
/// else means the session can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The key does not exist (it expired or was never written).
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The coordination service could not be reached.
    #[error("communication failure: {0}")]
    Communication(String),

    /// The coordination service answered with an error.
    #[error("registry rejected request ({code}): {message}")]
    Rejected { code: u32, message: String },
}

impl RegistryError {
    /// Whether this error is the "key not found" race.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }
}

/// Opens sessions to the coordination service.
///
/// A connector is cheap to keep for the whole process lifetime; sessions are
/// created from it and thrown away after a communication failure.
#[async_trait]
pub trait RegistryConnector: Send + Sync {
    /// Establish a new session. Does not retry.
    async fn connect(&self) -> Result<Box<dyn RegistrySession>, RegistryError>;
}

/// A live session with the coordination service.
#[async_trait]
pub trait RegistrySession: Send + Sync {
    /// Create or overwrite `key` with `value`, expiring after `ttl`.
    async fn publish(&self, key: &RegistryKey, value: &str, ttl: Duration)
        -> Result<(), RegistryError>;

    /// Reset the TTL of an existing key without touching its value.
    ///
    /// Must fail with [`RegistryError::KeyNotFound`] rather than create the key.
    async fn refresh(&self, key: &RegistryKey, ttl: Duration) -> Result<(), RegistryError>;

    /// Delete `key`.
    async fn delete(&self, key: &RegistryKey) -> Result<(), RegistryError>;
}
