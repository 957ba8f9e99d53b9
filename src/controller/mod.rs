//! Controller module for the CStorPoolCluster operator.
//!
//! - `builder`: dependency assembly and validation
//! - `runtime`: the worker pool driving reconciliation
//! - `reconciler`: the per-key sync handler
//! - `validation`: spec checks run before any API call
//! - `recorder`: Kubernetes events against watched objects
//! - `key`: work queue keys

pub mod builder;
pub mod key;
pub mod reconciler;
pub mod recorder;
pub mod runtime;
pub mod validation;

pub use builder::ControllerBuilder;
pub use key::ObjectKey;
pub use runtime::Controller;
