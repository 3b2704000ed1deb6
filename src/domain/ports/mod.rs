mod container_runtime;
mod registry;
mod stats_source;

pub use container_runtime::{ContainerError, ContainerRuntime, PortBinding};
pub use registry::{RegistryConnector, RegistryError, RegistrySession};
pub use stats_source::{StatsError, StatsSource, LIMIT_MAXBYTES};
