//! Process-wide registry of the resource kinds this operator understands.
//!
//! Registration happens exactly once, behind a `OnceLock`, before any
//! controller is assembled. Concurrent builders all observe the same fully
//! populated scheme and never mutate it.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use k8s_openapi::api::core::v1::Event as CoreEvent;
use kube::Resource;
use kube::core::GroupVersionKind;
use tracing::debug;

use crate::crd::{BlockDevice, CStorPoolCluster};

static SCHEME: OnceLock<Scheme> = OnceLock::new();

/// Set of known group/version/kinds.
#[derive(Debug, Default)]
pub struct Scheme {
    known: BTreeSet<(String, String, String)>,
}

impl Scheme {
    /// Register a statically typed resource.
    pub fn add_known_type<K>(&mut self)
    where
        K: Resource<DynamicType = ()>,
    {
        self.known.insert((
            K::group(&()).into_owned(),
            K::version(&()).into_owned(),
            K::kind(&()).into_owned(),
        ));
    }

    /// Whether a statically typed resource was registered.
    pub fn recognizes<K>(&self) -> bool
    where
        K: Resource<DynamicType = ()>,
    {
        self.recognizes_gvk(&GroupVersionKind::gvk(
            &K::group(&()),
            &K::version(&()),
            &K::kind(&()),
        ))
    }

    /// Whether a group/version/kind was registered.
    pub fn recognizes_gvk(&self, gvk: &GroupVersionKind) -> bool {
        self.known
            .contains(&(gvk.group.clone(), gvk.version.clone(), gvk.kind.clone()))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// The operator's scheme, registering all kinds on first use.
pub fn scheme() -> &'static Scheme {
    SCHEME.get_or_init(|| {
        let mut scheme = Scheme::default();
        scheme.add_known_type::<CStorPoolCluster>();
        scheme.add_known_type::<BlockDevice>();
        scheme.add_known_type::<CoreEvent>();
        debug!(kinds = scheme.len(), "Registered resource kinds");
        scheme
    })
}
