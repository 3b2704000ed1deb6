//! Domain Entities - Core business objects
//!
//! These entities describe what the registrar advertises. They have no
//! external dependencies beyond serialization.

use crate::domain::value_objects::{RegistryKey, Weight};
use serde::{Deserialize, Serialize};

/// Where memcached listens and where clients should reach it.
///
/// The internal pair is used to query the instance directly, the public pair
/// is what gets advertised and must be routable from outside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Address the registrar uses to reach memcached
    pub internal_addr: String,
    /// Port the registrar uses to reach memcached
    pub internal_port: u16,
    /// Externally routable address advertised to clients
    pub public_addr: String,
    /// Externally routable port advertised to clients
    pub public_port: u16,
}

impl Endpoint {
    /// `host:port` used to query memcached.
    pub fn internal_socket(&self) -> String {
        format!("{}:{}", self.internal_addr, self.internal_port)
    }

    /// Registry key for this endpoint under `registry_path`.
    pub fn registry_key(&self, registry_path: &str) -> RegistryKey {
        RegistryKey::new(registry_path, &self.public_addr, self.public_port)
    }
}

/// Value stored in the registry for one memcached instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub host: String,
    pub port: u16,
    pub weight: Weight,
}

impl ServiceRecord {
    /// Describe an endpoint's public side with the given weight.
    pub fn new(endpoint: &Endpoint, weight: Weight) -> Self {
        Self {
            host: endpoint.public_addr.clone(),
            port: endpoint.public_port,
            weight,
        }
    }

    /// Compact JSON form stored as the registry value.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
