//! Sync handler for one CStorPoolCluster key.
//!
//! Reads the object from the informer cache, validates it, checks the block
//! devices it references through the NDM client and records the outcome in
//! the object's status and as events.

use kube::ResourceExt;
use kube::api::{Patch, PatchParams};
use tracing::{debug, info, warn};

use crate::client::{NdmClient, OpenebsClient};
use crate::controller::key::ObjectKey;
use crate::controller::recorder::EventRecorder;
use crate::controller::validation::{block_device_names, validate_spec};
use crate::crd::{CStorPoolCluster, CStorPoolClusterStatus, Condition};
use crate::error::{Error, Result};
use crate::informer::Lister;

/// Field manager name for status patches
pub const FIELD_MANAGER: &str = "cspc-operator";

/// Dependencies of the sync handler.
#[derive(Clone)]
pub struct SyncContext {
    pub openebs_client: OpenebsClient,
    pub ndm_client: NdmClient,
    pub lister: Lister<CStorPoolCluster>,
    pub recorder: EventRecorder,
}

/// Reconcile the CSPC identified by `key`.
pub async fn sync_cspc(ctx: &SyncContext, key: &ObjectKey) -> Result<()> {
    let Some(cspc) = ctx.lister.get(&key.namespace, &key.name) else {
        debug!(key = %key, "CSPC has been deleted");
        return Ok(());
    };

    if cspc.metadata.deletion_timestamp.is_some() {
        debug!(key = %key, "CSPC is being deleted, skipping");
        return Ok(());
    }

    let generation = cspc.metadata.generation;

    if let Err(e) = validate_spec(&cspc) {
        let reported = update_status(
            ctx,
            &cspc,
            Condition::synced(false, "InvalidSpec", &e.to_string(), generation),
        )
        .await?;
        if reported {
            warn!(key = %key, error = %e, "Validation failed");
            ctx.recorder
                .warning(
                    &*cspc,
                    "ValidationFailed",
                    "Validating",
                    Some(e.to_string()),
                )
                .await;
        }
        return Err(e);
    }

    let unusable = unusable_block_devices(ctx, &cspc).await?;
    if !unusable.is_empty() {
        let note = format!("block devices not usable: {}", unusable.join(", "));
        ctx.recorder
            .warning(
                &*cspc,
                "BlockDeviceNotReady",
                "Validating",
                Some(note.clone()),
            )
            .await;
        return Err(Error::Transient(note));
    }

    let spec_changed = cspc.status.as_ref().and_then(|s| s.observed_generation) != generation;

    update_status(
        ctx,
        &cspc,
        Condition::synced(true, "Synced", "CSPC synced successfully", generation),
    )
    .await?;

    if spec_changed {
        info!(key = %key, pools = cspc.spec.pools.len(), "CSPC synced");
        ctx.recorder
            .normal(
                &*cspc,
                "Synced",
                "Reconciling",
                Some(format!("{} pool(s) desired", cspc.spec.pools.len())),
            )
            .await;
    }

    Ok(())
}

/// Block devices that are missing or reported inactive by NDM.
async fn unusable_block_devices(ctx: &SyncContext, cspc: &CStorPoolCluster) -> Result<Vec<String>> {
    let namespace = cspc.namespace().unwrap_or_default();
    let api = ctx.ndm_client.block_devices(&namespace);

    let mut unusable = Vec::new();
    for pool in &cspc.spec.pools {
        for name in block_device_names(pool) {
            match api.get_opt(name).await? {
                Some(bd) if bd.is_active() => {}
                Some(_) => unusable.push(format!("{} (inactive)", name)),
                None => unusable.push(format!("{} (not found)", name)),
            }
        }
    }
    Ok(unusable)
}

/// Status `cspc` should carry once `condition` holds.
pub(crate) fn desired_status(cspc: &CStorPoolCluster, condition: Condition) -> CStorPoolClusterStatus {
    let mut status = cspc.status.clone().unwrap_or_default();
    status.desired_instances = i32::try_from(cspc.spec.pools.len()).unwrap_or(i32::MAX);
    status.observed_generation = cspc.metadata.generation;
    status.set_condition(condition);
    status
}

/// Patch desired instance count and the Synced condition.
///
/// Returns false without writing when the cached status already matches,
/// since every write comes back through the watch as another update.
async fn update_status(ctx: &SyncContext, cspc: &CStorPoolCluster, condition: Condition) -> Result<bool> {
    let status = desired_status(cspc, condition);
    if cspc.status.as_ref() == Some(&status) {
        debug!(name = %cspc.name_any(), "Status unchanged, skipping patch");
        return Ok(false);
    }

    let namespace = cspc.namespace().unwrap_or_default();
    let api = ctx.openebs_client.cstor_pool_clusters(&namespace);
    let patch = serde_json::json!({
        "status": {
            "desiredInstances": status.desired_instances,
            "observedGeneration": status.observed_generation,
            "conditions": status.conditions,
        }
    });

    api.patch_status(
        &cspc.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    Ok(true)
}
