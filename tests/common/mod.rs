//! In-memory registry with TTL enforcement for lifecycle tests.
//!
//! Expiry follows tokio's clock, so tests running with paused time see keys
//! expire exactly when the registry would.

#![allow(dead_code)]

use async_trait::async_trait;
use memcached_registrar::{RegistryConnector, RegistryError, RegistryKey, RegistrySession};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Connect,
    Publish(String),
    Refresh(String),
    Delete(String),
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    ops: Mutex<Vec<(Instant, Op)>>,
    offline: AtomicBool,
}

/// Shared handle to the store; every session sees the same keys.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<Inner>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn RegistryConnector> {
        Arc::new(self.clone())
    }

    /// Simulate an outage: every operation fails until brought back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Drop a key as if its TTL had run out.
    pub fn expire(&self, key: &str) {
        self.inner.entries.lock().unwrap().remove(key);
    }

    /// Current value of a live key.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.inner
            .entries
            .lock()
            .unwrap()
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    /// Time left before a live key expires.
    pub fn ttl_left(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .entries
            .lock()
            .unwrap()
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.expires_at - now)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.inner
            .ops
            .lock()
            .unwrap()
            .iter()
            .map(|(_, op)| op.clone())
            .collect()
    }

    pub fn timed_ops(&self) -> Vec<(Instant, Op)> {
        self.inner.ops.lock().unwrap().clone()
    }

    fn log(&self, op: Op) -> Result<(), RegistryError> {
        self.inner.ops.lock().unwrap().push((Instant::now(), op));
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(RegistryError::Communication("registry offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryConnector for MemoryRegistry {
    async fn connect(&self) -> Result<Box<dyn RegistrySession>, RegistryError> {
        self.log(Op::Connect)?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RegistrySession for MemoryRegistry {
    async fn publish(
        &self,
        key: &RegistryKey,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RegistryError> {
        self.log(Op::Publish(key.to_string()))?;
        self.inner.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn refresh(&self, key: &RegistryKey, ttl: Duration) -> Result<(), RegistryError> {
        self.log(Op::Refresh(key.to_string()))?;
        let now = Instant::now();
        let mut entries = self.inner.entries.lock().unwrap();
        match entries.get_mut(key.as_str()) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + ttl;
                Ok(())
            }
            _ => {
                entries.remove(key.as_str());
                Err(RegistryError::KeyNotFound(key.to_string()))
            }
        }
    }

    async fn delete(&self, key: &RegistryKey) -> Result<(), RegistryError> {
        self.log(Op::Delete(key.to_string()))?;
        match self.inner.entries.lock().unwrap().remove(key.as_str()) {
            Some(_) => Ok(()),
            None => Err(RegistryError::KeyNotFound(key.to_string())),
        }
    }
}
