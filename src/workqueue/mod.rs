//! Work queue feeding reconciliation workers.
//!
//! - `queue`: deduplicating FIFO with processing tracking and delayed adds
//! - `rate_limiter`: retry delay policies (per-item exponential, token bucket)

pub mod queue;
pub mod rate_limiter;

pub use queue::WorkQueue;
pub use rate_limiter::{
    BucketRateLimiter, ItemExponentialFailureRateLimiter, MaxOfRateLimiter, RateLimiter,
    default_controller_rate_limiter,
};
