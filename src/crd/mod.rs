//! Custom Resource Definitions (CRDs) for cspc-operator.
//!
//! - `CStorPoolCluster`: desired cStor pool layout across nodes (watched)
//! - `BlockDevice`: NDM-managed disks referenced by pools (read only)

mod block_device;
mod cstor_pool_cluster;

pub use block_device::*;
pub use cstor_pool_cluster::*;
