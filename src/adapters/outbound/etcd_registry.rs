//! etcd Registry
//!
//! Implements the registry ports on top of the etcd v2 keys API.
//! Records are plain keys with a TTL; refreshes use `refresh=true` together
//! with `prevExist=true` so etcd rejects a refresh of an expired key instead
//! of recreating it.

use crate::domain::ports::{RegistryConnector, RegistryError, RegistrySession};
use crate::domain::value_objects::RegistryKey;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// etcd error code for a missing key.
const ETCD_KEY_NOT_FOUND: u32 = 100;

/// Error body returned by the v2 keys API.
#[derive(Debug, Deserialize)]
struct EtcdErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u32,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

/// Configuration for reaching etcd.
#[derive(Debug, Clone)]
pub struct EtcdConfig {
    /// Base URL of the etcd client API (e.g., "http://10.0.0.1:2379")
    pub base_url: String,
    /// Upper bound for every request
    pub request_timeout: Duration,
}

impl EtcdConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Opens [`EtcdSession`]s.
pub struct EtcdConnector {
    config: EtcdConfig,
}

impl EtcdConnector {
    pub fn new(config: EtcdConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RegistryConnector for EtcdConnector {
    async fn connect(&self) -> Result<Box<dyn RegistrySession>, RegistryError> {
        let base_url = url::Url::parse(&self.config.base_url).map_err(|e| {
            RegistryError::Communication(format!("invalid etcd URL {}: {}", self.config.base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| RegistryError::Communication(format!("client error: {}", e)))?;

        let url = format!("{}/version", self.config.base_url);
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Communication(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RegistryError::Communication(format!(
                "etcd version check failed: {}",
                response.status()
            )));
        }

        tracing::debug!("connected to etcd at {}", self.config.base_url);

        Ok(Box::new(EtcdSession { client, base_url }))
    }
}

/// Session bound to one HTTP client.
pub struct EtcdSession {
    client: reqwest::Client,
    base_url: url::Url,
}

impl EtcdSession {
    /// `<base>/v2/keys/<key>`, each key segment percent-encoded.
    fn key_url(&self, key: &RegistryKey) -> Result<url::Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RegistryError::Communication(format!("{} cannot carry a key path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["v2", "keys"])
            .extend(key.as_str().split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Map a response to the registry error taxonomy.
    async fn check(response: reqwest::Response) -> Result<(), RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<EtcdErrorBody>(&body) {
            Ok(err) if err.error_code == ETCD_KEY_NOT_FOUND => {
                Err(RegistryError::KeyNotFound(err.cause.unwrap_or(err.message)))
            }
            Ok(err) => Err(RegistryError::Rejected {
                code: err.error_code,
                message: err.message,
            }),
            Err(_) => Err(RegistryError::Rejected {
                code: u32::from(status.as_u16()),
                message: body,
            }),
        }
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<(), RegistryError> {
        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Communication(e.to_string()))?;
        Self::check(response).await
    }
}

#[async_trait]
impl RegistrySession for EtcdSession {
    async fn publish(
        &self,
        key: &RegistryKey,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RegistryError> {
        let ttl = ttl.as_secs().to_string();
        let request = self
            .client
            .put(self.key_url(key)?)
            .form(&[("value", value), ("ttl", ttl.as_str())]);
        Self::send(request).await
    }

    async fn refresh(&self, key: &RegistryKey, ttl: Duration) -> Result<(), RegistryError> {
        let ttl = ttl.as_secs().to_string();
        let request = self.client.put(self.key_url(key)?).form(&[
            ("ttl", ttl.as_str()),
            ("refresh", "true"),
            ("prevExist", "true"),
        ]);
        Self::send(request).await
    }

    async fn delete(&self, key: &RegistryKey) -> Result<(), RegistryError> {
        Self::send(self.client.delete(self.key_url(key)?)).await
    }
}
