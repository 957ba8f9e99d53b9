//! Kubernetes connectivity and typed client sets.
//!
//! ## Architecture
//!
//! - `connection`: resolves how to reach the API server (explicit kubeconfig
//!   or in-cluster credentials) into a reusable [`Connection`]
//! - `clientset`: one typed client per API family, each built independently
//!   from the same connection
//!
//! ## Example
//!
//! ```rust,ignore
//! use cspc_operator::client::{resolve_config, ClientSet, OpenebsClient};
//!
//! let connection = resolve_config(None).await?;
//! let openebs = OpenebsClient::new_for_config(&connection)?;
//! let cspcs = openebs.cstor_pool_clusters("openebs").list(&Default::default()).await?;
//! ```

pub mod clientset;
pub mod connection;

pub use clientset::{ClientFamily, ClientSet, KubeClient, NdmClient, OpenebsClient};
pub use connection::{ConfigSource, Connection, resolve_config};
