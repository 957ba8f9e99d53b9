//! Shared informer factory: one informer per kind, all started together.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use kube::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::{ClientFamily, ClientSet};
use crate::informer::shared::{InformerResource, RunnableInformer, SharedInformer};
use crate::scoped_api;

/// Hands out shared informers for one client family.
///
/// Every consumer asking for the same kind gets the same informer. All
/// interest (listers, handlers) must be registered before [`Self::start`].
pub struct SharedInformerFactory {
    family: ClientFamily,
    client: Client,
    resync: Duration,
    namespace: Option<String>,
    informers: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    runnables: Mutex<Vec<Arc<dyn RunnableInformer>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SharedInformerFactory {
    /// Create a factory for `clients`, resyncing every `resync`.
    pub fn new<C: ClientSet>(clients: &C, resync: Duration) -> Self {
        Self {
            family: C::FAMILY,
            client: clients.client().clone(),
            resync,
            namespace: None,
            informers: Mutex::new(HashMap::new()),
            runnables: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Restrict every informer to one namespace.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    pub fn family(&self) -> ClientFamily {
        self.family
    }

    pub fn resync_interval(&self) -> Duration {
        self.resync
    }

    /// The informer for `K`, created on first request.
    pub fn informer<K: InformerResource>(&self) -> Arc<SharedInformer<K>> {
        let mut informers = self.informers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = informers.get(&TypeId::of::<K>())
            && let Ok(informer) = Arc::clone(existing).downcast::<SharedInformer<K>>()
        {
            return informer;
        }

        let api = scoped_api::<K>(self.client.clone(), self.namespace.as_deref());
        let informer = Arc::new(SharedInformer::<K>::new(api, self.resync));
        informers.insert(TypeId::of::<K>(), informer.clone());
        self.runnables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(informer.clone());
        informer
    }

    /// Launch every informer not yet running. Does not block.
    pub fn start(&self, stop: &CancellationToken) {
        let runnables = self.runnables.lock().unwrap_or_else(|e| e.into_inner());
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());

        let mut launched = 0;
        for runnable in runnables.iter() {
            if runnable.mark_started() {
                tasks.push(tokio::spawn(Arc::clone(runnable).run(stop.child_token())));
                launched += 1;
            }
        }
        info!(
            family = %self.family,
            informers = launched,
            "Started informer factory"
        );
    }

    /// Whether every started informer has synced.
    pub fn has_synced(&self) -> bool {
        self.runnables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .all(|r| r.has_synced())
    }

    /// Kinds with an informer, in creation order.
    pub fn kinds(&self) -> Vec<String> {
        self.runnables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|r| r.kind().to_string())
            .collect()
    }

    /// Wait for every informer task to exit after the stop signal.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!(family = %self.family, error = %e, "Informer task panicked");
            }
        }
        info!(family = %self.family, "Informer factory stopped");
    }
}
