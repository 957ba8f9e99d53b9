//! BlockDevice Custom Resource Definition.
//!
//! BlockDevices are discovered and owned by the Node Disk Manager (NDM).
//! The operator only reads them to check that the devices a
//! CStorPoolCluster references exist and are usable.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BlockDevice represents a disk attached to a node.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "openebs.io",
    version = "v1alpha1",
    kind = "BlockDevice",
    plural = "blockdevices",
    shortname = "bd",
    status = "BlockDeviceStatus",
    namespaced,
    printcolumn = r#"{"name":"Node", "type":"string", "jsonPath":".spec.nodeAttributes.nodeName"}"#,
    printcolumn = r#"{"name":"Size", "type":"string", "jsonPath":".spec.capacity.storage"}"#,
    printcolumn = r#"{"name":"ClaimState", "type":"string", "jsonPath":".status.claimState"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceSpec {
    /// Node the device is attached to.
    #[serde(default)]
    pub node_attributes: NodeAttributes,

    /// Device capacity.
    #[serde(default)]
    pub capacity: DeviceCapacity,

    /// Device path on the node (e.g. "/dev/sdb").
    #[serde(default)]
    pub path: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    #[serde(default)]
    pub node_name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapacity {
    /// Size in bytes.
    #[serde(default)]
    pub storage: u64,
}

/// Status of a BlockDevice.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceStatus {
    /// "Unclaimed", "Claimed" or "Released".
    #[serde(default)]
    pub claim_state: String,

    /// "Active", "Inactive" or "Unknown".
    #[serde(default)]
    pub state: String,
}

impl BlockDevice {
    /// Whether NDM currently reports the device as present.
    pub fn is_active(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.state == "Active")
    }

    /// Node hosting the device.
    pub fn node_name(&self) -> &str {
        &self.spec.node_attributes.node_name
    }
}
