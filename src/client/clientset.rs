//! Typed client sets, one per API family.
//!
//! All three wrap a `kube::Client` built from the same [`Connection`], but
//! each is constructed on its own so a failure names the family that broke.

use kube::{Api, Client};

use crate::client::connection::Connection;
use crate::crd::{BlockDevice, CStorPoolCluster};
use crate::error::{Error, Result};

/// API families the operator talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientFamily {
    /// Core Kubernetes APIs (events, nodes).
    Kubernetes,
    /// OpenEBS storage APIs (CStorPoolCluster).
    Openebs,
    /// Node Disk Manager APIs (BlockDevice).
    Ndm,
}

impl std::fmt::Display for ClientFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientFamily::Kubernetes => write!(f, "kubernetes"),
            ClientFamily::Openebs => write!(f, "openebs"),
            ClientFamily::Ndm => write!(f, "ndm"),
        }
    }
}

/// A typed client for one API family.
pub trait ClientSet: Clone + Send + Sync + 'static {
    /// Family this client set belongs to.
    const FAMILY: ClientFamily;

    /// Wrap an existing client.
    fn from_client(client: Client) -> Self;

    /// Shared handle to the underlying client.
    fn client(&self) -> &Client;

    /// Build the client set from a resolved connection.
    fn new_for_config(connection: &Connection) -> Result<Self> {
        Client::try_from(connection.config().clone())
            .map(Self::from_client)
            .map_err(|source| Error::ClientBuild {
                family: Self::FAMILY,
                source,
            })
    }
}

/// Core Kubernetes client.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl ClientSet for KubeClient {
    const FAMILY: ClientFamily = ClientFamily::Kubernetes;

    fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn client(&self) -> &Client {
        &self.client
    }
}

/// OpenEBS client for pool resources.
#[derive(Clone)]
pub struct OpenebsClient {
    client: Client,
}

impl OpenebsClient {
    /// CStorPoolClusters in a namespace.
    pub fn cstor_pool_clusters(&self, namespace: &str) -> Api<CStorPoolCluster> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl ClientSet for OpenebsClient {
    const FAMILY: ClientFamily = ClientFamily::Openebs;

    fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn client(&self) -> &Client {
        &self.client
    }
}

/// Node Disk Manager client for block devices.
#[derive(Clone)]
pub struct NdmClient {
    client: Client,
}

impl NdmClient {
    /// BlockDevices in a namespace.
    pub fn block_devices(&self, namespace: &str) -> Api<BlockDevice> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl ClientSet for NdmClient {
    const FAMILY: ClientFamily = ClientFamily::Ndm;

    fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn client(&self) -> &Client {
        &self.client
    }
}
