//! Event-driven caches of remote objects.
//!
//! - `factory`: one [`SharedInformerFactory`] per client family, keyed by the
//!   resync interval, owning the background watch tasks
//! - `shared`: the per-kind list+watch cache and change feed
//! - `lister`: read-only cache lookups
//! - `handler`: add/update/delete callbacks
//! - `sync`: gating work on the initial listing

pub mod factory;
pub mod handler;
pub mod lister;
pub mod shared;
pub mod sync;

pub use factory::SharedInformerFactory;
pub use handler::{EventHandler, ResourceEventHandlerFuncs};
pub use lister::Lister;
pub use shared::{InformerResource, SharedInformer};
pub use sync::{InformerSynced, wait_for_cache_sync};
