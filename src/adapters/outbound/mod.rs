mod docker_runtime;
mod etcd_registry;
mod memcached_stats;

pub use docker_runtime::DockerRuntime;
pub use etcd_registry::{EtcdConfig, EtcdConnector, EtcdSession};
pub use memcached_stats::MemcachedStats;
