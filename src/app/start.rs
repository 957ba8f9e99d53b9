//! Ordered operator startup.
//!
//! connectivity -> clients -> resync interval -> informer factories ->
//! controller -> factories started -> controller run -> factory teardown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::config::OperatorConfig;
use crate::app::sync_interval::{EnvLookup, ProcessEnv, resolve_sync_interval};
use crate::client::{ClientSet, KubeClient, NdmClient, OpenebsClient, resolve_config};
use crate::controller::ControllerBuilder;
use crate::error::Result;
use crate::health::HealthState;
use crate::informer::SharedInformerFactory;
use crate::signals::setup_signal_handler;

/// Run the operator until the first termination signal.
pub async fn start(config: &OperatorConfig, health_state: Option<Arc<HealthState>>) -> Result<()> {
    let stop = setup_signal_handler()?;
    start_with_signal(config, &ProcessEnv, health_state, stop).await
}

/// Run the operator until `stop` fires.
///
/// Returns the first fatal startup error, or the controller's result once
/// it has stopped and both informer factories have shut down.
pub async fn start_with_signal(
    config: &OperatorConfig,
    env: &impl EnvLookup,
    health_state: Option<Arc<HealthState>>,
    stop: CancellationToken,
) -> Result<()> {
    let connection = resolve_config(config.kubeconfig.as_deref()).await?;

    let kube_client = KubeClient::new_for_config(&connection)?;
    let openebs_client = OpenebsClient::new_for_config(&connection)?;
    let ndm_client = NdmClient::new_for_config(&connection)?;
    info!(cluster_url = %connection.cluster_url(), "Built clientsets");

    let resync = resolve_sync_interval(env);
    let namespace = config.watch_namespace();
    let kube_informer_factory =
        SharedInformerFactory::new(&kube_client, resync).with_namespace(namespace.clone());
    let cspc_informer_factory =
        SharedInformerFactory::new(&openebs_client, resync).with_namespace(namespace.clone());

    let mut builder = ControllerBuilder::new()
        .with_kube_client(kube_client.clone())
        .with_openebs_client(openebs_client)
        .with_ndm_client(ndm_client)
        .with_cspc_synced(&cspc_informer_factory)
        .with_cspc_lister(&cspc_informer_factory)
        .with_recorder(&kube_client)
        .with_event_handler(&cspc_informer_factory)
        .with_workqueue_rate_limiting()
        .with_cache_sync_timeout(config.cache_sync_timeout());
    if let Some(state) = health_state {
        builder = builder.with_health_state(state);
    }
    let controller = builder.build()?;

    info!(
        resync_secs = resync.as_secs(),
        namespace = namespace.as_deref().unwrap_or("cluster-wide"),
        "Starting informer factories"
    );
    kube_informer_factory.start(&stop);
    cspc_informer_factory.start(&stop);

    let result = controller.run(usize::from(config.workers), stop.clone()).await;

    // Informer tasks only exit on cancellation, including when run failed
    stop.cancel();
    kube_informer_factory.shutdown().await;
    cspc_informer_factory.shutdown().await;

    result
}
