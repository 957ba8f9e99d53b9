//! CStorPoolCluster Custom Resource Definition.
//!
//! A CStorPoolCluster (CSPC) describes a set of cStor pools, one per
//! selected node, each assembled from NDM block devices arranged in raid
//! groups.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CStorPoolCluster is the custom resource watched by this operator.
///
/// Example:
/// ```yaml
/// apiVersion: openebs.io/v1alpha1
/// kind: CStorPoolCluster
/// metadata:
///   name: cspc-mirror
///   namespace: openebs
/// spec:
///   pools:
///     - nodeSelector:
///         kubernetes.io/hostname: worker-1
///       raidGroups:
///         - type: mirror
///           blockDevices:
///             - blockDeviceName: blockdevice-ada8ef910929513c1ad650c08fbe3f36
///             - blockDeviceName: blockdevice-ada8ef910929513c1ad650c08fbe3f37
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "openebs.io",
    version = "v1alpha1",
    kind = "CStorPoolCluster",
    plural = "cstorpoolclusters",
    shortname = "cspc",
    status = "CStorPoolClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Desired", "type":"integer", "jsonPath":".status.desiredInstances"}"#,
    printcolumn = r#"{"name":"Provisioned", "type":"integer", "jsonPath":".status.provisionedInstances"}"#,
    printcolumn = r#"{"name":"Healthy", "type":"integer", "jsonPath":".status.healthyInstances"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CStorPoolClusterSpec {
    /// One entry per pool instance. Each entry selects exactly one node.
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

/// Pool layout on a single node.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    /// Labels selecting the node that hosts this pool instance.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    /// Raid groups making up the pool.
    #[serde(default)]
    pub raid_groups: Vec<RaidGroup>,

    /// Pool-wide defaults.
    #[serde(default)]
    pub pool_config: PoolConfig,
}

/// A group of block devices combined with a single raid layout.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RaidGroup {
    /// Raid layout; falls back to `poolConfig.defaultRaidGroupType`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Block devices in this group.
    #[serde(default)]
    pub block_devices: Vec<CStorPoolClusterBlockDevice>,

    /// Use this group as a write cache.
    #[serde(default)]
    pub is_write_cache: bool,

    /// Use this group as hot spares.
    #[serde(default)]
    pub is_spare: bool,

    /// Use this group as a read cache.
    #[serde(default)]
    pub is_read_cache: bool,
}

/// Reference to an NDM BlockDevice.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CStorPoolClusterBlockDevice {
    /// Name of the BlockDevice object.
    pub block_device_name: String,

    /// Capacity observed for the device, filled in by the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,

    /// Stable device link on the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_link: Option<String>,
}

/// Pool-wide defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// Raid layout used by groups that do not set their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_raid_group_type: Option<String>,

    /// Allow volumes larger than the pool capacity.
    #[serde(default)]
    pub over_provisioning: bool,

    /// Compression algorithm (e.g. "lz", "off").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
}

impl PoolSpec {
    /// Effective raid type of a group in this pool.
    pub fn raid_type_of(&self, group: &RaidGroup) -> Option<String> {
        group
            .type_
            .clone()
            .or_else(|| self.pool_config.default_raid_group_type.clone())
    }
}

/// Supported raid layouts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RaidGroupType {
    Stripe,
    Mirror,
    Raidz,
    Raidz2,
}

impl RaidGroupType {
    /// Whether a raid group of this type may hold `count` block devices.
    ///
    /// stripe: at least one; mirror: a non-zero even count;
    /// raidz: 2^n + 1 with n >= 1; raidz2: 2^n + 2 with n >= 2.
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            RaidGroupType::Stripe => count >= 1,
            RaidGroupType::Mirror => count >= 2 && count % 2 == 0,
            RaidGroupType::Raidz => count >= 3 && (count - 1).is_power_of_two(),
            RaidGroupType::Raidz2 => count >= 6 && (count - 2).is_power_of_two(),
        }
    }
}

impl std::fmt::Display for RaidGroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaidGroupType::Stripe => write!(f, "stripe"),
            RaidGroupType::Mirror => write!(f, "mirror"),
            RaidGroupType::Raidz => write!(f, "raidz"),
            RaidGroupType::Raidz2 => write!(f, "raidz2"),
        }
    }
}

impl std::str::FromStr for RaidGroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(RaidGroupType::Stripe),
            "mirror" => Ok(RaidGroupType::Mirror),
            "raidz" => Ok(RaidGroupType::Raidz),
            "raidz2" => Ok(RaidGroupType::Raidz2),
            _ => Err(format!("unknown raid group type: {}", s)),
        }
    }
}

/// Status of a CStorPoolCluster.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CStorPoolClusterStatus {
    /// Number of pool instances the spec asks for.
    #[serde(default)]
    pub desired_instances: i32,

    /// Number of pool instances that exist.
    #[serde(default)]
    pub provisioned_instances: i32,

    /// Number of pool instances reporting healthy.
    #[serde(default)]
    pub healthy_instances: i32,

    /// The generation most recently observed by the controller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions describing the current state.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl CStorPoolClusterStatus {
    /// Add or replace the condition of the same type.
    ///
    /// A replacement that keeps the same status keeps the previous
    /// `lastTransitionTime`.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition
                        .last_transition_time
                        .clone_from(&existing.last_transition_time);
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }
}

/// Condition describes the state of a CSPC at a certain point.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    pub status: String,
    /// Machine-readable reason for the condition's last transition.
    pub reason: String,
    /// Human-readable message indicating details about last transition.
    pub message: String,
    /// Last time the condition transitioned from one status to another.
    pub last_transition_time: String,
    /// The generation of the resource this condition was observed for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition.
    pub fn new(
        condition_type: &str,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: jiff::Timestamp::now().to_string(),
            observed_generation: generation,
        }
    }

    /// Create a "Synced" condition.
    pub fn synced(synced: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new("Synced", synced, reason, message, generation)
    }
}
