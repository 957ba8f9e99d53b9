//! Resolution of the informer resync interval.

use std::time::Duration;

use tracing::warn;

/// Environment variable holding the resync interval in whole seconds.
pub const RESYNC_INTERVAL_ENV: &str = "RESYNC_INTERVAL";

/// Interval used when the environment does not provide a usable value.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Read access to environment variables.
pub trait EnvLookup {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<F> EnvLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Resolve the resync interval from `RESYNC_INTERVAL`.
///
/// The value must be a plain integer; surrounding whitespace makes it
/// non-numeric. Missing, non-numeric, zero and negative values all fall
/// back to [`DEFAULT_RESYNC_INTERVAL`] with a warning. Never fails.
pub fn resolve_sync_interval(env: &impl EnvLookup) -> Duration {
    let raw = env.var(RESYNC_INTERVAL_ENV);
    match raw.as_deref().map(str::parse::<i64>) {
        Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
        _ => {
            warn!(
                value = ?raw,
                default_secs = DEFAULT_RESYNC_INTERVAL.as_secs(),
                "Incorrect resync interval obtained from env, using default"
            );
            DEFAULT_RESYNC_INTERVAL
        }
    }
}
