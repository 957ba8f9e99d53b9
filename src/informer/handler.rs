//! Change notification callbacks.

/// Receives change notifications from an informer.
///
/// Callbacks run on the informer's task and must not block; they typically
/// just enqueue a key.
pub trait EventHandler<K>: Send + Sync {
    fn on_add(&self, obj: &K);
    fn on_update(&self, old: &K, new: &K);
    fn on_delete(&self, obj: &K);
}

type Callback<K> = Box<dyn Fn(&K) + Send + Sync>;
type UpdateCallback<K> = Box<dyn Fn(&K, &K) + Send + Sync>;

/// An [`EventHandler`] assembled from optional closures.
pub struct ResourceEventHandlerFuncs<K> {
    add: Option<Callback<K>>,
    update: Option<UpdateCallback<K>>,
    delete: Option<Callback<K>>,
}

impl<K> Default for ResourceEventHandlerFuncs<K> {
    fn default() -> Self {
        Self {
            add: None,
            update: None,
            delete: None,
        }
    }
}

impl<K> ResourceEventHandlerFuncs<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_add(mut self, f: impl Fn(&K) + Send + Sync + 'static) -> Self {
        self.add = Some(Box::new(f));
        self
    }

    pub fn with_update(mut self, f: impl Fn(&K, &K) + Send + Sync + 'static) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    pub fn with_delete(mut self, f: impl Fn(&K) + Send + Sync + 'static) -> Self {
        self.delete = Some(Box::new(f));
        self
    }
}

impl<K> EventHandler<K> for ResourceEventHandlerFuncs<K> {
    fn on_add(&self, obj: &K) {
        if let Some(f) = &self.add {
            f(obj);
        }
    }

    fn on_update(&self, old: &K, new: &K) {
        if let Some(f) = &self.update {
            f(old, new);
        }
    }

    fn on_delete(&self, obj: &K) {
        if let Some(f) = &self.delete {
            f(obj);
        }
    }
}
