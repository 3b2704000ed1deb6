//! Capacity Prober
//!
//! Waits for the local memcached instance to answer `stats` and turns its
//! memory limit into a weight.

use crate::domain::ports::{StatsError, StatsSource};
use crate::domain::value_objects::Weight;
use crate::infrastructure::ShutdownController;
use std::sync::Arc;
use std::time::Duration;

/// Delay between attempts while memcached is not ready.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(15);

/// Determines the weight of a memcached instance.
pub struct CapacityProber {
    stats: Arc<dyn StatsSource>,
    addr: String,
    retry_backoff: Duration,
}

impl CapacityProber {
    /// Create a prober for the instance at `addr` (`host:port`).
    pub fn new(stats: Arc<dyn StatsSource>, addr: impl Into<String>) -> Self {
        Self {
            stats,
            addr: addr.into(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Set the delay between attempts.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Query the instance once.
    pub async fn probe_once(&self) -> Result<Weight, StatsError> {
        let bytes = self.stats.limit_maxbytes(&self.addr).await?;
        Ok(Weight::from_max_bytes(bytes))
    }

    /// Query the instance until it answers.
    ///
    /// There is no attempt limit. Returns `None` only if shutdown is
    /// requested first.
    pub async fn probe(&self, shutdown: &ShutdownController) -> Option<Weight> {
        loop {
            match shutdown.run_until_cancelled(self.probe_once()).await? {
                Ok(weight) => {
                    tracing::info!("memcached server weight is {}", weight);
                    return Some(weight);
                }
                Err(e) => {
                    tracing::warn!(
                        "unable to query memcached at {}: {}; will retry in {:?}",
                        self.addr,
                        e,
                        self.retry_backoff
                    );
                }
            }

            if !shutdown.sleep(self.retry_backoff).await {
                return None;
            }
        }
    }
}
