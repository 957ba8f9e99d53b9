//! Startup configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command line and environment configuration for the operator.
#[derive(Parser, Debug, Clone)]
#[command(name = "cspc-operator")]
#[command(about = "Kubernetes operator for OpenEBS CStorPoolCluster resources")]
pub struct OperatorConfig {
    /// Path to a kubeconfig. Only required if out-of-cluster.
    #[arg(long, env = "KUBECONFIG_PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Number of concurrent reconciliation workers
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Namespace to watch; empty watches every namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds to wait for informer caches before giving up
    #[arg(long, default_value_t = 120)]
    pub cache_sync_timeout_secs: u64,

    /// Address for the health and metrics server
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub health_addr: SocketAddr,

    /// Emit JSON logs
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub log_json: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            workers: 2,
            namespace: None,
            cache_sync_timeout_secs: 120,
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_json: true,
        }
    }
}

impl OperatorConfig {
    pub fn cache_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_sync_timeout_secs)
    }

    /// Namespace to scope informers to, if any.
    pub fn watch_namespace(&self) -> Option<String> {
        self.namespace.clone().filter(|ns| !ns.is_empty())
    }
}
