//! Resolution of API server connectivity.
//!
//! An explicit kubeconfig path always wins and never falls back. Without
//! one, the process must be running inside a cluster with a mounted service
//! account.

use std::path::{Path, PathBuf};

use kube::Config;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Where a [`Connection`] was resolved from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// An explicit kubeconfig file.
    Kubeconfig(PathBuf),
    /// Service account credentials mounted into the pod.
    InCluster,
    /// Built directly from a [`Config`].
    Custom,
}

/// Immutable endpoint and credential bundle shared by every client family.
#[derive(Clone, Debug)]
pub struct Connection {
    config: Config,
    source: ConfigSource,
}

impl Connection {
    /// Wrap an already built config.
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            source: ConfigSource::Custom,
        }
    }

    /// Underlying kube config. Clients clone it; it is never mutated.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// API server URL.
    pub fn cluster_url(&self) -> &http::Uri {
        &self.config.cluster_url
    }

    /// Namespace used when a request does not name one.
    pub fn default_namespace(&self) -> &str {
        &self.config.default_namespace
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }
}

/// Resolve cluster connectivity.
///
/// A non-empty `kubeconfig` is loaded from disk; any read or parse failure
/// is returned as-is. Otherwise in-cluster discovery is attempted, and its
/// failure is equally fatal.
pub async fn resolve_config(kubeconfig: Option<&Path>) -> Result<Connection> {
    match kubeconfig.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => load_kubeconfig(path).await,
        None => {
            debug!("Kubeconfig flag is empty, using in-cluster config");
            let config = Config::incluster().map_err(Error::InCluster)?;
            info!(cluster_url = %config.cluster_url, "Resolved in-cluster config");
            Ok(Connection {
                config,
                source: ConfigSource::InCluster,
            })
        }
    }
}

async fn load_kubeconfig(path: &Path) -> Result<Connection> {
    let kubeconfig_error = |source| Error::Kubeconfig {
        path: path.display().to_string(),
        source,
    };

    let kubeconfig = Kubeconfig::read_from(path).map_err(kubeconfig_error)?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(kubeconfig_error)?;

    info!(
        path = %path.display(),
        cluster_url = %config.cluster_url,
        "Resolved kubeconfig"
    );

    Ok(Connection {
        config,
        source: ConfigSource::Kubeconfig(path.to_path_buf()),
    })
}
