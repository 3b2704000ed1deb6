//! memcached-registrar - Register memcached in an etcd service registry
//!
//! This is the composition root that wires together all the components.

use clap::Parser;
use memcached_registrar::adapters::outbound::{DockerRuntime, EtcdConfig, EtcdConnector, MemcachedStats};
use memcached_registrar::infrastructure::shutdown_signal;
use memcached_registrar::{CapacityProber, Cli, Registrar, ServiceRecord, ShutdownController};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    // Setup logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    // Try to fill in missing arguments from the Docker environment
    if cli.needs_container_lookup() {
        let docker = DockerRuntime::new(cli.docker_socket.clone());
        let container_id = std::env::var("HOSTNAME").ok();
        cli.fill_from_container(&docker, container_id.as_deref()).await;
    }

    let cfg = cli.resolve()?;

    tracing::info!(
        "starting memcached-registrar registry={} endpoint={}:{} ttl={:?}",
        cfg.registry.base_url,
        cfg.endpoint.public_addr,
        cfg.endpoint.public_port,
        cfg.ttl
    );

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Weight: explicit override, or wait for memcached to tell us
    let weight = match cfg.weight {
        Some(weight) => weight,
        None => {
            let prober = CapacityProber::new(
                Arc::new(MemcachedStats::default()),
                cfg.endpoint.internal_socket(),
            );
            match prober.probe(&shutdown).await {
                Some(weight) => weight,
                None => return Ok(()),
            }
        }
    };

    let connector = Arc::new(EtcdConnector::new(EtcdConfig::new(
        cfg.registry.base_url.clone(),
    )));
    let registrar = Registrar::new(
        connector,
        cfg.endpoint.registry_key(&cfg.registry.path),
        ServiceRecord::new(&cfg.endpoint, weight),
        cfg.ttl,
    )?;

    registrar.run(&shutdown).await;

    tracing::info!("memcached-registrar stopped");
    Ok(())
}
