//! Validation logic for CStorPoolCluster specs.
//!
//! Checks performed before any API call:
//! - At least one pool
//! - Every pool selects a node and has data raid groups
//! - Every raid group has a known type and a block device count it accepts
//! - No block device is referenced twice

use std::collections::HashSet;

use crate::crd::{CStorPoolCluster, PoolSpec, RaidGroupType};
use crate::error::{Error, Result};

/// Validate the CSPC spec
pub fn validate_spec(cspc: &CStorPoolCluster) -> Result<()> {
    if cspc.spec.pools.is_empty() {
        return Err(Error::Validation("spec.pools must not be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for (index, pool) in cspc.spec.pools.iter().enumerate() {
        validate_pool(index, pool)?;
        for bd in block_device_names(pool) {
            if !seen.insert(bd) {
                return Err(Error::Validation(format!(
                    "block device {} is used more than once",
                    bd
                )));
            }
        }
    }

    Ok(())
}

/// Validate a single pool
fn validate_pool(index: usize, pool: &PoolSpec) -> Result<()> {
    if pool.node_selector.is_empty() {
        return Err(Error::Validation(format!(
            "pools[{}]: nodeSelector must not be empty",
            index
        )));
    }

    if !pool
        .raid_groups
        .iter()
        .any(|g| !g.is_write_cache && !g.is_spare && !g.is_read_cache)
    {
        return Err(Error::Validation(format!(
            "pools[{}]: at least one data raid group is required",
            index
        )));
    }

    for (group_index, group) in pool.raid_groups.iter().enumerate() {
        let raid_type = pool.raid_type_of(group).ok_or_else(|| {
            Error::Validation(format!(
                "pools[{}].raidGroups[{}]: raid type not set and no default in poolConfig",
                index, group_index
            ))
        })?;
        let raid_type: RaidGroupType = raid_type.parse().map_err(|e| {
            Error::Validation(format!("pools[{}].raidGroups[{}]: {}", index, group_index, e))
        })?;

        let count = group.block_devices.len();
        if !raid_type.accepts(count) {
            return Err(Error::Validation(format!(
                "pools[{}].raidGroups[{}]: {} block devices not valid for {}",
                index, group_index, count, raid_type
            )));
        }

        if group
            .block_devices
            .iter()
            .any(|bd| bd.block_device_name.is_empty())
        {
            return Err(Error::Validation(format!(
                "pools[{}].raidGroups[{}]: blockDeviceName must not be empty",
                index, group_index
            )));
        }
    }

    Ok(())
}

/// Names of every block device a pool references.
pub fn block_device_names(pool: &PoolSpec) -> impl Iterator<Item = &str> {
    pool.raid_groups
        .iter()
        .flat_map(|g| g.block_devices.iter())
        .map(|bd| bd.block_device_name.as_str())
}
