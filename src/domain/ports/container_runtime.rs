//! Container Runtime Port
//!
//! Defines the interface for discovering how a container port is published
//! on the host.

use async_trait::async_trait;

/// Host side of a published container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Host interface the port is bound to (`0.0.0.0` means all interfaces)
    pub host_ip: String,
    /// Host port mapped to the container port
    pub host_port: u16,
}

impl PortBinding {
    /// Whether `host_ip` names a concrete, advertisable interface.
    pub fn has_routable_ip(&self) -> bool {
        !self.host_ip.is_empty() && self.host_ip != "0.0.0.0" && self.host_ip != "::"
    }
}

/// Errors raised while inspecting the container.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container runtime unreachable: {0}")]
    Unreachable(#[from] std::io::Error),

    #[error("container runtime returned status {0}")]
    Status(u16),

    #[error("malformed container runtime response: {0}")]
    Malformed(String),
}

/// Introspection of the container this process runs in.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Look up the host binding of `container_port/tcp` for `container_id`.
    ///
    /// Returns `Ok(None)` when the port is not published.
    async fn port_binding(
        &self,
        container_id: &str,
        container_port: u16,
    ) -> Result<Option<PortBinding>, ContainerError>;
}
