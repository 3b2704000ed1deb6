//! Docker Container Runtime
//!
//! Implements ContainerRuntime by inspecting the container through the
//! Docker Engine API on its Unix socket.

use crate::domain::ports::{ContainerError, ContainerRuntime, PortBinding};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Subset of `GET /containers/{id}/json` the registrar reads.
#[derive(Debug, Deserialize)]
struct ContainerInspect {
    #[serde(rename = "NetworkSettings")]
    network_settings: NetworkSettings,
}

#[derive(Debug, Deserialize)]
struct NetworkSettings {
    #[serde(rename = "Ports", default)]
    ports: HashMap<String, Option<Vec<HostBinding>>>,
}

#[derive(Debug, Deserialize)]
struct HostBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort")]
    host_port: String,
}

/// Docker Engine API client over a Unix socket.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DockerRuntime {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Issue a GET against the Engine API and return the response body.
    #[cfg(unix)]
    async fn get(&self, path: &str) -> Result<Vec<u8>, ContainerError> {
        use http_body_util::{BodyExt, Empty};
        use hyper::body::Bytes;
        use hyper::{Method, Request};
        use hyper_util::client::legacy::Client;
        use hyperlocal::{UnixClientExt, UnixConnector, Uri};

        let client: Client<UnixConnector, Empty<Bytes>> = Client::unix();
        let url: hyper::Uri = Uri::new(&self.socket_path, path).into();

        let request = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header("Accept", "application/json")
            .body(Empty::new())
            .map_err(|e| ContainerError::Malformed(format!("failed to build request: {}", e)))?;

        tracing::debug!("docker GET {}", path);

        let response = client
            .request(request)
            .await
            .map_err(|e| ContainerError::Unreachable(std::io::Error::other(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContainerError::Status(status.as_u16()));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ContainerError::Unreachable(std::io::Error::other(e)))?;
        Ok(body.to_bytes().to_vec())
    }

    #[cfg(not(unix))]
    async fn get(&self, _path: &str) -> Result<Vec<u8>, ContainerError> {
        Err(ContainerError::Unreachable(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "unix sockets are not available on this platform",
        )))
    }
}

/// Find the host binding of `container_port/tcp` in an inspect document.
fn find_binding(body: &[u8], container_port: u16) -> Result<Option<PortBinding>, ContainerError> {
    let inspect: ContainerInspect =
        serde_json::from_slice(body).map_err(|e| ContainerError::Malformed(e.to_string()))?;

    let key = format!("{}/tcp", container_port);
    let Some(first) = inspect
        .network_settings
        .ports
        .get(&key)
        .and_then(|bindings| bindings.as_ref())
        .and_then(|bindings| bindings.first())
    else {
        return Ok(None);
    };

    let host_port = first
        .host_port
        .parse()
        .map_err(|_| ContainerError::Malformed(format!("bad HostPort {:?}", first.host_port)))?;

    Ok(Some(PortBinding {
        host_ip: first.host_ip.clone(),
        host_port,
    }))
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn port_binding(
        &self,
        container_id: &str,
        container_port: u16,
    ) -> Result<Option<PortBinding>, ContainerError> {
        let path = format!("/containers/{}/json", container_id);
        let body = tokio::time::timeout(self.timeout, self.get(&path))
            .await
            .map_err(|_| {
                ContainerError::Unreachable(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timeout inspecting container",
                ))
            })??;
        find_binding(&body, container_port)
    }
}
