//! Cache Statistics Port
//!
//! Defines the interface for reading statistics from the local cache instance.

use async_trait::async_trait;
use std::collections::HashMap;

/// Statistic holding the configured memory limit in bytes.
pub const LIMIT_MAXBYTES: &str = "limit_maxbytes";

/// Errors raised while reading cache statistics.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("connection failed: {0}")]
    Connect(std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout waiting for stats")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("statistic {0} missing from response")]
    MissingStat(&'static str),

    #[error("statistic {name} is malformed: {value:?}")]
    Malformed { name: &'static str, value: String },
}

/// Source of statistics for a cache instance.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetch every statistic the instance reports, keyed by name.
    async fn stats(&self, addr: &str) -> Result<HashMap<String, String>, StatsError>;

    /// Fetch the configured memory limit in bytes.
    async fn limit_maxbytes(&self, addr: &str) -> Result<u64, StatsError> {
        let stats = self.stats(addr).await?;
        let raw = stats
            .get(LIMIT_MAXBYTES)
            .ok_or(StatsError::MissingStat(LIMIT_MAXBYTES))?;
        raw.trim().parse().map_err(|_| StatsError::Malformed {
            name: LIMIT_MAXBYTES,
            value: raw.clone(),
        })
    }
}
