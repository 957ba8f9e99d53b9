//! Error types for the operator.
//!
//! Startup errors (connectivity, client construction, controller assembly)
//! are fatal and bubble up to `main`. Reconciliation errors are classified
//! for retry behavior and never leave the worker that produced them.

use thiserror::Error;

use crate::client::ClientFamily;

/// Error type for operator operations
#[derive(Error, Debug)]
pub enum Error {
    /// The explicit kubeconfig could not be read or parsed
    #[error("error building kubeconfig from {path}")]
    Kubeconfig {
        path: String,
        #[source]
        source: kube::config::KubeconfigError,
    },

    /// Ambient in-cluster credentials are unavailable
    #[error("error building in-cluster config")]
    InCluster(#[source] kube::config::InClusterError),

    /// One of the client families failed to construct
    #[error("error building {family} clientset")]
    ClientBuild {
        family: ClientFamily,
        #[source]
        source: kube::Error,
    },

    /// A required controller dependency was never supplied to the builder
    #[error("error building controller instance: missing {0}")]
    MissingDependency(&'static str),

    /// A resource kind used by the controller was never registered
    #[error("kind {0} is not registered in the scheme")]
    UnregisteredKind(String),

    /// Interest was registered with an informer that is already running
    #[error("informer for {kind} already started, handlers must be registered before start")]
    InformerStarted { kind: String },

    /// Caches did not finish their initial listing
    #[error("failed to wait for caches to sync: {0}")]
    CacheSync(String),

    /// Worker count must be positive
    #[error("worker count must be greater than zero")]
    InvalidWorkerCount,

    /// Termination signal handling could not be installed
    #[error("signal handler: {0}")]
    SignalHandler(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error in resource spec
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transient error that should be retried
    #[error("Transient error: {0}")]
    Transient(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if a failed reconciliation should be put back on the queue
    ///
    /// Invalid specs and rejected requests stay invalid until the object
    /// changes, which enqueues it again anyway.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Validation(_) | Error::Serialization(_) => false,
            Error::Kube(kube::Error::Api(api_err)) => !matches!(api_err.code, 400 | 422),
            _ => true,
        }
    }
}

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, Error>;
