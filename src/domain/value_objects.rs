//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Bytes per megabyte as memcached reports `limit_maxbytes`.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Relative capacity of a memcached instance, in megabytes.
///
/// Load balancers divide by the total weight, so a weight is never zero.
/// Values are also capped at [`Weight::MAX`] so a corrupt statistic cannot
/// swamp every other backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weight(u32);

impl Weight {
    /// Smallest weight a backend can advertise.
    pub const MIN: Weight = Weight(1);
    /// Largest weight a backend can advertise (1 TiB expressed in MB).
    pub const MAX: Weight = Weight(1024 * 1024);

    /// Create a weight, clamping into `[MIN, MAX]`.
    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Derive a weight from memcached's `limit_maxbytes`.
    ///
    /// # Examples
    /// ```
    /// use memcached_registrar::domain::value_objects::Weight;
    ///
    /// assert_eq!(Weight::from_max_bytes(8 * 1024 * 1024).get(), 8);
    /// assert_eq!(Weight::from_max_bytes(0).get(), 1);
    /// ```
    pub fn from_max_bytes(bytes: u64) -> Self {
        let megabytes = bytes / BYTES_PER_MB;
        let clamped = megabytes.min(u64::from(Self::MAX.0));
        Self::new(clamped as u32)
    }

    /// Get the raw weight value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key under which a service record is published.
///
/// Derived from the registry path and the advertised `host:port`, so the same
/// endpoint always maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey(String);

impl RegistryKey {
    /// Build the key for an advertised endpoint.
    ///
    /// Trailing slashes on the registry path are ignored.
    pub fn new(registry_path: &str, host: &str, port: u16) -> Self {
        Self(format!("{}/{}:{}", registry_path.trim_end_matches('/'), host, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
