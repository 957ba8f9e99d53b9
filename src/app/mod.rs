//! Operator startup: configuration, resync interval and the ordered start
//! sequence.

pub mod config;
pub mod start;
pub mod sync_interval;

pub use config::OperatorConfig;
pub use start::{start, start_with_signal};
pub use sync_interval::{
    DEFAULT_RESYNC_INTERVAL, EnvLookup, ProcessEnv, RESYNC_INTERVAL_ENV, resolve_sync_interval,
};
