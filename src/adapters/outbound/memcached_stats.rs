//! Memcached Stats Client
//!
//! Implements StatsSource with the memcached text protocol `stats` command.

use crate::domain::ports::{StatsError, StatsSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Reads general-purpose statistics from a memcached instance.
#[derive(Debug, Clone)]
pub struct MemcachedStats {
    /// Upper bound for connect plus the whole exchange
    timeout: Duration,
}

impl MemcachedStats {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange(addr: &str) -> Result<HashMap<String, String>, StatsError> {
        let stream = TcpStream::connect(addr).await.map_err(StatsError::Connect)?;
        let (read_half, mut write_half) = stream.into_split();

        write_half.write_all(b"stats\r\n").await?;
        write_half.flush().await?;

        let mut lines = BufReader::new(read_half).lines();
        let mut stats = HashMap::new();

        while let Some(line) = lines.next_line().await? {
            if let Some(entry) = parse_line(&line)? {
                stats.insert(entry.0, entry.1);
            } else {
                return Ok(stats);
            }
        }

        Err(StatsError::Protocol(
            "connection closed before END".to_string(),
        ))
    }
}

impl Default for MemcachedStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Parse one response line.
///
/// Returns `Ok(None)` on the `END` terminator.
fn parse_line(line: &str) -> Result<Option<(String, String)>, StatsError> {
    let line = line.trim_end_matches('\r');
    if line == "END" {
        return Ok(None);
    }

    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("STAT"), Some(name), Some(value)) => Ok(Some((name.to_string(), value.to_string()))),
        _ => Err(StatsError::Protocol(format!("unexpected line: {:?}", line))),
    }
}

#[async_trait]
impl StatsSource for MemcachedStats {
    async fn stats(&self, addr: &str) -> Result<HashMap<String, String>, StatsError> {
        tokio::time::timeout(self.timeout, Self::exchange(addr))
            .await
            .map_err(|_| StatsError::Timeout)?
    }
}
