//! Registration Loop
//!
//! Keeps a leased service record alive in the registry for as long as the
//! process runs.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Init ──connect──▶ Publishing ──▶ Registered ──deadline──▶ Refreshing ──ok──▶ Registered
//!  ▲                    ▲                                       │
//!  │                    └────────────── key not found ──────────┤
//!  └──────────── Reconnecting ◀──── communication failure ──────┘
//! ```
//!
//! Every wait happens inside a single cancellable step, so shutdown
//! interrupts sleeps and in-flight requests alike. After cancellation the
//! record is deleted once, best effort; the TTL removes it anyway.

use crate::domain::entities::ServiceRecord;
use crate::domain::ports::{RegistryConnector, RegistrySession};
use crate::domain::value_objects::RegistryKey;
use crate::infrastructure::ShutdownController;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Delay before reconnecting after a communication failure.
pub const DEFAULT_OUTAGE_BACKOFF: Duration = Duration::from_secs(60);

/// Upper bound for the delete issued on shutdown.
pub const DEFAULT_RETRACT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest lease the registrar will request, in seconds.
pub const MAX_TTL_SECS: u64 = u32::MAX as u64;

/// Where the registration lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// No session; one must be established
    Init,
    /// Session established; the record must be written
    Publishing,
    /// Record written; waiting for the refresh deadline
    Registered { refresh_at: Instant },
    /// Refresh deadline reached
    Refreshing,
    /// Session lost; waiting before starting over
    Reconnecting,
}

/// Publishes one service record and keeps its lease alive.
pub struct Registrar {
    connector: Arc<dyn RegistryConnector>,
    key: RegistryKey,
    record: ServiceRecord,
    value: String,
    ttl: Duration,
    outage_backoff: Duration,
    retract_timeout: Duration,
}

impl Registrar {
    /// Create a registrar for `record` stored at `key` with the given TTL.
    ///
    /// The TTL is capped at [`MAX_TTL_SECS`].
    pub fn new(
        connector: Arc<dyn RegistryConnector>,
        key: RegistryKey,
        record: ServiceRecord,
        ttl: Duration,
    ) -> serde_json::Result<Self> {
        let value = record.to_json()?;
        Ok(Self {
            connector,
            key,
            record,
            value,
            ttl: ttl.min(Duration::from_secs(MAX_TTL_SECS)),
            outage_backoff: DEFAULT_OUTAGE_BACKOFF,
            retract_timeout: DEFAULT_RETRACT_TIMEOUT,
        })
    }

    /// Set the delay before reconnecting after a communication failure.
    pub fn outage_backoff(mut self, backoff: Duration) -> Self {
        self.outage_backoff = backoff;
        self
    }

    /// Set the upper bound for the delete issued on shutdown.
    pub fn retract_timeout(mut self, timeout: Duration) -> Self {
        self.retract_timeout = timeout;
        self
    }

    pub fn key(&self) -> &RegistryKey {
        &self.key
    }

    pub fn record(&self) -> &ServiceRecord {
        &self.record
    }

    /// Time between a successful write and the next refresh: 3/4 of the TTL.
    pub fn refresh_interval(&self) -> Duration {
        self.ttl / 4 * 3
    }

    /// Run until shutdown, then retract the record.
    pub async fn run(&self, shutdown: &ShutdownController) {
        let mut session: Option<Box<dyn RegistrySession>> = None;
        let mut state = RegistrationState::Init;

        while let Some(next) = shutdown
            .run_until_cancelled(self.step(state, &mut session))
            .await
        {
            tracing::trace!("registration state {:?} -> {:?}", state, next);
            state = next;
        }

        self.retract(session.as_deref()).await;
    }

    /// Perform the work of `state` and return the state that follows.
    async fn step(
        &self,
        state: RegistrationState,
        session: &mut Option<Box<dyn RegistrySession>>,
    ) -> RegistrationState {
        match state {
            RegistrationState::Init => match self.connector.connect().await {
                Ok(new_session) => {
                    *session = Some(new_session);
                    RegistrationState::Publishing
                }
                Err(e) => {
                    tracing::warn!(
                        "unable to connect to registry: {}; will retry in {:?}",
                        e,
                        self.outage_backoff
                    );
                    RegistrationState::Reconnecting
                }
            },

            RegistrationState::Publishing => {
                let Some(current) = session.as_deref() else {
                    return RegistrationState::Init;
                };

                tracing::info!("registering service at {}", self.key);
                match current.publish(&self.key, &self.value, self.ttl).await {
                    Ok(()) => self.registered(),
                    Err(e) => {
                        tracing::warn!(
                            "communication to registry lost while registering: {}; will retry in {:?}",
                            e,
                            self.outage_backoff
                        );
                        RegistrationState::Reconnecting
                    }
                }
            }

            RegistrationState::Registered { refresh_at } => {
                tokio::time::sleep_until(refresh_at).await;
                RegistrationState::Refreshing
            }

            RegistrationState::Refreshing => {
                let Some(current) = session.as_deref() else {
                    return RegistrationState::Init;
                };

                tracing::debug!("refreshing service entry {}", self.key);
                match current.refresh(&self.key, self.ttl).await {
                    Ok(()) => self.registered(),
                    Err(e) if e.is_key_not_found() => {
                        tracing::warn!(
                            "service entry {} expired before it could be refreshed; \
                             re-registering. Consider raising the TTL (currently {:?})",
                            self.key,
                            self.ttl
                        );
                        RegistrationState::Publishing
                    }
                    Err(e) => {
                        tracing::warn!(
                            "communication to registry lost: {}; will retry in {:?}",
                            e,
                            self.outage_backoff
                        );
                        RegistrationState::Reconnecting
                    }
                }
            }

            RegistrationState::Reconnecting => {
                tokio::time::sleep(self.outage_backoff).await;
                *session = None;
                RegistrationState::Init
            }
        }
    }

    fn registered(&self) -> RegistrationState {
        RegistrationState::Registered {
            refresh_at: Instant::now() + self.refresh_interval(),
        }
    }

    /// Delete the record once, ignoring every failure.
    ///
    /// Without a live session a fresh one is opened for the delete.
    async fn retract(&self, session: Option<&dyn RegistrySession>) {
        tracing::info!("unregistering service at {}", self.key);

        let attempt = async {
            match session {
                Some(current) => current.delete(&self.key).await,
                None => self.connector.connect().await?.delete(&self.key).await,
            }
        };

        match tokio::time::timeout(self.retract_timeout, attempt).await {
            Ok(Ok(())) => tracing::debug!("service entry {} removed", self.key),
            Ok(Err(e)) => tracing::debug!("unable to remove service entry {}: {}", self.key, e),
            Err(_) => tracing::debug!("timed out removing service entry {}", self.key),
        }
    }
}
