//! Work queue keys identifying one object.

use kube::{Resource, ResourceExt};

/// `namespace/name` identity of a queued object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Key for a namespaced object; `None` if it has no name or namespace.
    pub fn from_obj<K: Resource>(obj: &K) -> Option<Self> {
        let namespace = obj.namespace()?;
        let name = obj.meta().name.clone()?;
        Some(Self { namespace, name })
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl std::str::FromStr for ObjectKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(format!("unexpected key format: {:?}", s)),
        }
    }
}
