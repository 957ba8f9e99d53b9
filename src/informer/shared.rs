//! A single list+watch cache for one resource kind.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::informer::handler::EventHandler;
use crate::informer::lister::Lister;
use crate::informer::sync::InformerSynced;

/// Resources an informer can cache.
pub trait InformerResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + DeserializeOwned
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<K> InformerResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// An in-progress relist.
///
/// The reflector store only swaps in the new listing at `InitDone`, so the
/// add/update notifications are held until then; handlers that read the
/// lister must see the object they are told about.
pub(crate) struct Relist<K: InformerResource> {
    seen: HashSet<ObjectRef<K>>,
    pending: Vec<(Option<Arc<K>>, K)>,
}

impl<K: InformerResource> Default for Relist<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            pending: Vec::new(),
        }
    }
}

/// Cache and change feed for one resource kind.
///
/// Handlers must be registered before the owning factory starts the
/// informer; later registrations are rejected.
pub struct SharedInformer<K: InformerResource> {
    kind: String,
    api: Api<K>,
    resync: Duration,
    reader: Store<K>,
    writer: Mutex<Option<Writer<K>>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler<K>>>>,
    started: AtomicBool,
    synced: Arc<AtomicBool>,
}

impl<K: InformerResource> SharedInformer<K> {
    pub(crate) fn new(api: Api<K>, resync: Duration) -> Self {
        let writer = Writer::default();
        let reader = writer.as_reader();
        Self {
            kind: K::kind(&()).into_owned(),
            api,
            resync,
            reader,
            writer: Mutex::new(Some(writer)),
            handlers: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
            synced: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Lister backed by this informer's cache.
    pub fn lister(&self) -> Lister<K> {
        Lister::new(self.reader.clone())
    }

    /// Whether the first full listing has been applied.
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    /// Predicate reporting [`Self::has_synced`], detached from the informer.
    pub fn synced_fn(&self) -> InformerSynced {
        let synced = Arc::clone(&self.synced);
        Arc::new(move || synced.load(Ordering::SeqCst))
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Register a change handler. Fails once the informer has started.
    pub fn add_event_handler(&self, handler: impl EventHandler<K> + 'static) -> Result<()> {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if self.started.load(Ordering::SeqCst) {
            return Err(Error::InformerStarted {
                kind: self.kind.clone(),
            });
        }
        handlers.push(Arc::new(handler));
        debug!(kind = %self.kind, handlers = handlers.len(), "Registered event handler");
        Ok(())
    }

    /// Flip to started. Returns false if it already was.
    pub(crate) fn mark_started(&self) -> bool {
        let _handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        !self.started.swap(true, Ordering::SeqCst)
    }

    fn dispatch(&self, f: impl Fn(&dyn EventHandler<K>)) {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for handler in handlers.iter() {
            f(handler.as_ref());
        }
    }

    /// Apply one watch event to the cache and notify handlers.
    pub(crate) fn handle_event(
        &self,
        writer: &mut Writer<K>,
        relist: &mut Option<Relist<K>>,
        event: watcher::Event<K>,
    ) {
        match &event {
            watcher::Event::Init => {
                debug!(kind = %self.kind, "Relist started");
                *relist = Some(Relist::default());
                writer.apply_watcher_event(&event);
            }
            watcher::Event::InitApply(obj) => {
                let key = ObjectRef::from_obj(obj);
                let old = self.reader.get(&key);
                writer.apply_watcher_event(&event);
                let listing = relist.get_or_insert_with(Relist::default);
                listing.seen.insert(key);
                listing.pending.push((old, obj.clone()));
            }
            watcher::Event::InitDone => {
                let Relist { seen, pending } = relist.take().unwrap_or_default();
                let vanished: Vec<Arc<K>> = self
                    .reader
                    .state()
                    .into_iter()
                    .filter(|obj| !seen.contains(&ObjectRef::from_obj(obj.as_ref())))
                    .collect();
                writer.apply_watcher_event(&event);
                for (old, obj) in &pending {
                    match old {
                        Some(old) => self.dispatch(|h| h.on_update(old, obj)),
                        None => self.dispatch(|h| h.on_add(obj)),
                    }
                }
                for obj in &vanished {
                    self.dispatch(|h| h.on_delete(obj));
                }
                if !self.synced.swap(true, Ordering::SeqCst) {
                    info!(kind = %self.kind, objects = seen.len(), "Informer cache synced");
                }
            }
            watcher::Event::Apply(obj) => {
                let old = self.reader.get(&ObjectRef::from_obj(obj));
                writer.apply_watcher_event(&event);
                match old {
                    Some(old) => self.dispatch(|h| h.on_update(&old, obj)),
                    None => self.dispatch(|h| h.on_add(obj)),
                }
            }
            watcher::Event::Delete(obj) => {
                writer.apply_watcher_event(&event);
                self.dispatch(|h| h.on_delete(obj));
            }
        }
    }

    /// Re-deliver every cached object as an update.
    pub(crate) fn resync(&self) {
        let objects = self.reader.state();
        debug!(kind = %self.kind, objects = objects.len(), "Resyncing cache");
        for obj in &objects {
            self.dispatch(|h| h.on_update(obj, obj));
        }
    }

    async fn run(self: Arc<Self>, stop: CancellationToken) {
        let taken = self
            .writer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut writer) = taken else {
            warn!(kind = %self.kind, "Informer is already running");
            return;
        };

        info!(
            kind = %self.kind,
            resync_secs = self.resync.as_secs(),
            "Starting informer"
        );

        let stream = watcher(self.api.clone(), watcher::Config::default().any_semantic())
            .default_backoff();
        let mut stream = std::pin::pin!(stream);

        let mut resync = tokio::time::interval_at(Instant::now() + self.resync, self.resync);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut relist: Option<Relist<K>> = None;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = resync.tick(), if self.has_synced() => self.resync(),
                event = stream.next() => match event {
                    Some(Ok(event)) => self.handle_event(&mut writer, &mut relist, event),
                    Some(Err(e)) => {
                        warn!(kind = %self.kind, error = %e, "Watch failed, retrying with backoff");
                    }
                    None => {
                        warn!(kind = %self.kind, "Watch stream ended");
                        break;
                    }
                },
            }
        }

        info!(kind = %self.kind, "Informer stopped");
    }
}

/// Type-erased view used by the factory to start and track informers.
pub(crate) trait RunnableInformer: Send + Sync {
    fn kind(&self) -> &str;
    fn mark_started(&self) -> bool;
    fn has_synced(&self) -> bool;
    fn run(self: Arc<Self>, stop: CancellationToken) -> BoxFuture<'static, ()>;
}

impl<K: InformerResource> RunnableInformer for SharedInformer<K> {
    fn kind(&self) -> &str {
        SharedInformer::kind(self)
    }

    fn mark_started(&self) -> bool {
        SharedInformer::mark_started(self)
    }

    fn has_synced(&self) -> bool {
        SharedInformer::has_synced(self)
    }

    fn run(self: Arc<Self>, stop: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(SharedInformer::run(self, stop))
    }
}
