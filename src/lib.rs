//! memcached-registrar Library
//!
//! Announces a memcached instance to an etcd registry under a leased key,
//! keeping the lease alive until the process is told to stop.
//! The binary in `main.rs` wires these components together.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{CapacityProber, RegistrationState, Registrar};
pub use config::{Cli, Config, ConfigError, RegistryUrl};
pub use domain::entities::{Endpoint, ServiceRecord};
pub use domain::ports::{RegistryConnector, RegistryError, RegistrySession, StatsSource};
pub use domain::value_objects::{RegistryKey, Weight};
pub use infrastructure::ShutdownController;
