//! Assembles a [`Controller`] from its dependencies.
//!
//! Each `with_*` step supplies one dependency and hands the builder back.
//! Only [`ControllerBuilder::with_event_handler`] has a side effect: it
//! registers enqueue callbacks on the CSPC informer, so it must run before
//! the informer factory is started. [`ControllerBuilder::build`] is the single
//! point where completeness is checked.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::debug;

use crate::client::{KubeClient, NdmClient, OpenebsClient};
use crate::controller::key::ObjectKey;
use crate::controller::recorder::EventRecorder;
use crate::controller::reconciler::SyncContext;
use crate::controller::runtime::Controller;
use crate::crd::CStorPoolCluster;
use crate::error::{Error, Result};
use crate::health::HealthState;
use crate::informer::{InformerSynced, Lister, ResourceEventHandlerFuncs, SharedInformerFactory};
use crate::scheme::scheme;
use crate::workqueue::{WorkQueue, default_controller_rate_limiter};

/// Name of the CSPC work queue
pub const WORK_QUEUE_NAME: &str = "CStorPoolCluster";

/// Default bound on the initial cache sync wait
pub const DEFAULT_CACHE_SYNC_TIMEOUT: Duration = Duration::from_secs(120);

/// Queue slot shared between the registered callbacks and the built
/// controller. Filled by [`ControllerBuilder::with_workqueue_rate_limiting`].
type QueueSlot = Arc<OnceLock<WorkQueue<ObjectKey>>>;

/// Fluent builder for the CSPC controller.
pub struct ControllerBuilder {
    kube_client: Option<KubeClient>,
    openebs_client: Option<OpenebsClient>,
    ndm_client: Option<NdmClient>,
    cspc_synced: Option<InformerSynced>,
    cspc_lister: Option<Lister<CStorPoolCluster>>,
    recorder: Option<EventRecorder>,
    handlers_registered: bool,
    queue: QueueSlot,
    health_state: Option<Arc<HealthState>>,
    cache_sync_timeout: Duration,
    deferred_error: Option<Error>,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            kube_client: None,
            openebs_client: None,
            ndm_client: None,
            cspc_synced: None,
            cspc_lister: None,
            recorder: None,
            handlers_registered: false,
            queue: Arc::new(OnceLock::new()),
            health_state: None,
            cache_sync_timeout: DEFAULT_CACHE_SYNC_TIMEOUT,
            deferred_error: None,
        }
    }

    pub fn with_kube_client(mut self, client: KubeClient) -> Self {
        self.kube_client = Some(client);
        self
    }

    pub fn with_openebs_client(mut self, client: OpenebsClient) -> Self {
        self.openebs_client = Some(client);
        self
    }

    pub fn with_ndm_client(mut self, client: NdmClient) -> Self {
        self.ndm_client = Some(client);
        self
    }

    /// Gate reconciliation on the CSPC informer's initial listing.
    pub fn with_cspc_synced(mut self, factory: &SharedInformerFactory) -> Self {
        self.cspc_synced = Some(factory.informer::<CStorPoolCluster>().synced_fn());
        self
    }

    pub fn with_cspc_lister(mut self, factory: &SharedInformerFactory) -> Self {
        self.cspc_lister = Some(factory.informer::<CStorPoolCluster>().lister());
        self
    }

    /// Event recorder bound to the core client.
    pub fn with_recorder(mut self, client: &KubeClient) -> Self {
        self.recorder = Some(EventRecorder::new(client));
        self
    }

    /// Register add/update/delete callbacks that enqueue the object's key.
    ///
    /// A registration failure (the informer already started) is reported by
    /// [`Self::build`].
    pub fn with_event_handler(mut self, factory: &SharedInformerFactory) -> Self {
        let informer = factory.informer::<CStorPoolCluster>();

        let on_add = self.queue.clone();
        let on_update = self.queue.clone();
        let on_delete = self.queue.clone();
        let handlers = ResourceEventHandlerFuncs::new()
            .with_add(move |obj: &CStorPoolCluster| enqueue(&on_add, obj))
            .with_update(move |_old: &CStorPoolCluster, new: &CStorPoolCluster| {
                enqueue(&on_update, new)
            })
            .with_delete(move |obj: &CStorPoolCluster| enqueue(&on_delete, obj));

        match informer.add_event_handler(handlers) {
            Ok(()) => self.handlers_registered = true,
            Err(e) => {
                self.deferred_error.get_or_insert(e);
            }
        }
        self
    }

    /// Rate-limited work queue with the default controller backoff.
    pub fn with_workqueue_rate_limiting(self) -> Self {
        // Filled at most once; later calls keep the first queue
        let _ = self.queue.set(WorkQueue::new(
            WORK_QUEUE_NAME,
            default_controller_rate_limiter(),
        ));
        self
    }

    /// Readiness and metrics sink.
    pub fn with_health_state(mut self, state: Arc<HealthState>) -> Self {
        self.health_state = Some(state);
        self
    }

    pub fn with_cache_sync_timeout(mut self, timeout: Duration) -> Self {
        self.cache_sync_timeout = timeout;
        self
    }

    /// Validate that every required dependency was supplied.
    pub fn build(self) -> Result<Controller> {
        if let Some(e) = self.deferred_error {
            return Err(e);
        }

        // Only the recorder talks to the core API; the client must still be supplied
        if self.kube_client.is_none() {
            return Err(Error::MissingDependency("kubernetes client"));
        }
        let openebs_client = self
            .openebs_client
            .ok_or(Error::MissingDependency("openebs client"))?;
        let ndm_client = self
            .ndm_client
            .ok_or(Error::MissingDependency("ndm client"))?;
        let cspc_synced = self
            .cspc_synced
            .ok_or(Error::MissingDependency("CStorPoolCluster synced predicate"))?;
        let lister = self
            .cspc_lister
            .ok_or(Error::MissingDependency("CStorPoolCluster lister"))?;
        let recorder = self
            .recorder
            .ok_or(Error::MissingDependency("event recorder"))?;
        if !self.handlers_registered {
            return Err(Error::MissingDependency("event handler"));
        }
        let queue = self
            .queue
            .get()
            .cloned()
            .ok_or(Error::MissingDependency("rate limited work queue"))?;

        if !scheme().recognizes::<CStorPoolCluster>() {
            return Err(Error::UnregisteredKind(
                "CStorPoolCluster.openebs.io/v1alpha1".to_string(),
            ));
        }

        debug!(queue = %queue.name(), "Controller dependencies complete");

        let ctx = SyncContext {
            openebs_client,
            ndm_client,
            lister,
            recorder,
        };
        Ok(Controller::new(
            ctx,
            queue,
            vec![cspc_synced],
            self.health_state,
            self.cache_sync_timeout,
        ))
    }
}

fn enqueue(slot: &QueueSlot, obj: &CStorPoolCluster) {
    let Some(key) = ObjectKey::from_obj(obj) else {
        debug!("Ignoring object without namespace or name");
        return;
    };
    match slot.get() {
        Some(queue) => queue.add(key),
        None => debug!(key = %key, "Work queue not configured, dropping event"),
    }
}
