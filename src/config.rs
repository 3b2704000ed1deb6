//! Configuration
//!
//! Command line flags with environment fallbacks, optionally completed from
//! the container runtime, then validated into a [`Config`].

use crate::application::registrar::MAX_TTL_SECS;
use crate::domain::entities::Endpoint;
use crate::domain::ports::{ContainerRuntime, PortBinding};
use crate::domain::value_objects::Weight;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default etcd client port.
pub const DEFAULT_REGISTRY_PORT: u16 = 2379;

/// Register memcached in a service registry.
#[derive(Debug, Clone, Parser)]
#[command(name = "memcached-registrar")]
#[command(about = "Register memcached in a service registry")]
#[command(version)]
pub struct Cli {
    /// URL of the etcd server (etcd://host:port/path/to/service)
    #[arg(long, env = "REGISTRY")]
    pub registry: Option<String>,

    /// Internal address of memcached
    #[arg(long, env = "MEMCACHED_INTERNAL_ADDR", default_value = "127.0.0.1")]
    pub internal_addr: String,

    /// Internal port of memcached
    #[arg(long, env = "MEMCACHED_INTERNAL_PORT", default_value_t = 11211)]
    pub internal_port: u16,

    /// External address of memcached, registered with the registry
    #[arg(long, env = "MEMCACHED_PUBLIC_ADDR")]
    pub public_addr: Option<String>,

    /// External port of memcached, registered with the registry
    #[arg(long, env = "MEMCACHED_PUBLIC_PORT")]
    pub public_port: Option<u16>,

    /// TTL for registry entries, in seconds
    #[arg(
        long,
        env = "REGISTRAR_TTL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_SECS)
    )]
    pub ttl: u64,

    /// Memcached instance weight. Defaults to the number of MBs of memory
    /// memcached is allocated
    #[arg(
        long,
        env = "MEMCACHED_WEIGHT",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub weight: Option<u32>,

    /// Docker Engine API socket used to discover published ports
    #[arg(long, env = "DOCKER_SOCKET", default_value = "/var/run/docker.sock")]
    pub docker_socket: PathBuf,

    /// Enable debug logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,
}

/// Where the registry lives and under which path records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryUrl {
    /// Base URL of the etcd client API (e.g., "http://10.0.0.1:2379")
    pub base_url: String,
    /// Key prefix for published records, without trailing slash
    pub path: String,
}

impl FromStr for RegistryUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s).map_err(|e| ConfigError::InvalidRegistry(e.to_string()))?;

        let scheme = match url.scheme() {
            "etcd" | "http" => "http",
            "etcds" | "https" => "https",
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::InvalidRegistry(format!("{} has no host", s)))?;
        let port = url.port().unwrap_or(DEFAULT_REGISTRY_PORT);

        Ok(Self {
            base_url: format!("{}://{}:{}", scheme, host, port),
            path: url.path().trim_end_matches('/').to_string(),
        })
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub registry: RegistryUrl,
    pub endpoint: Endpoint,
    pub ttl: Duration,
    /// Explicit weight; probed from memcached when absent
    pub weight: Option<Weight>,
}

/// Configuration errors. All of them are fatal at start-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no etcd server was specified")]
    MissingRegistry,
    #[error("invalid registry URL: {0}")]
    InvalidRegistry(String),
    #[error("unsupported registry scheme {0:?} (expected etcd, etcds, http or https)")]
    UnsupportedScheme(String),
    #[error("the memcached server public address was not specified")]
    MissingPublicAddr,
    #[error("the memcached server public port was not specified")]
    MissingPublicPort,
}

impl Cli {
    /// Whether the public endpoint still has gaps the container could fill.
    pub fn needs_container_lookup(&self) -> bool {
        self.public_addr.is_none() || self.public_port.is_none()
    }

    /// Fill missing public address and port from a container port binding.
    pub fn apply_port_binding(&mut self, binding: &PortBinding) {
        if self.public_addr.is_none() {
            if binding.has_routable_ip() {
                self.public_addr = Some(binding.host_ip.clone());
            } else {
                tracing::warn!(
                    "unable to determine public IP address from container configuration; \
                     specify it manually"
                );
            }
        }
        if self.public_port.is_none() {
            self.public_port = Some(binding.host_port);
        }
    }

    /// Try to fill missing values from the container this process runs in.
    ///
    /// Failures are logged and leave the configuration untouched; validation
    /// decides later whether what remains is enough.
    pub async fn fill_from_container(
        &mut self,
        runtime: &dyn ContainerRuntime,
        container_id: Option<&str>,
    ) {
        if !self.needs_container_lookup() {
            return;
        }

        // In a container, the hostname is the container ID
        let Some(container_id) = container_id else {
            tracing::warn!("HOSTNAME environment variable is not set");
            return;
        };

        match runtime.port_binding(container_id, self.internal_port).await {
            Ok(Some(binding)) => self.apply_port_binding(&binding),
            Ok(None) => tracing::warn!(
                "port {}/tcp is not published by container {}",
                self.internal_port,
                container_id
            ),
            Err(e) => tracing::warn!("unable to inspect this container: {}", e),
        }
    }

    /// Validate into a [`Config`].
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let registry: RegistryUrl = self
            .registry
            .as_deref()
            .ok_or(ConfigError::MissingRegistry)?
            .parse()?;
        let public_addr = self.public_addr.ok_or(ConfigError::MissingPublicAddr)?;
        let public_port = self.public_port.ok_or(ConfigError::MissingPublicPort)?;

        Ok(Config {
            registry,
            endpoint: Endpoint {
                internal_addr: self.internal_addr,
                internal_port: self.internal_port,
                public_addr,
                public_port,
            },
            ttl: Duration::from_secs(self.ttl),
            weight: self.weight.map(Weight::new),
        })
    }
}
