//! cspc-operator library crate
//!
//! Bootstraps the OpenEBS CStorPoolCluster controller: cluster connectivity,
//! the three client families, shared informers, the rate-limited work queue
//! and the controller itself.

pub mod app;
pub mod client;
pub mod controller;
pub mod crd;
pub mod error;
pub mod health;
pub mod informer;
pub mod scheme;
pub mod signals;
pub mod workqueue;

pub use error::{Error, Result};
pub use health::HealthState;

use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}
