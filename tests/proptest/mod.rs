// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for cspc-operator.
//!
//! Uses proptest to generate random inputs and verify invariants.

use std::time::Duration;

use proptest::prelude::*;

use cspc_operator::app::{DEFAULT_RESYNC_INTERVAL, RESYNC_INTERVAL_ENV, resolve_sync_interval};
use cspc_operator::controller::ObjectKey;
use cspc_operator::crd::RaidGroupType;
use cspc_operator::workqueue::{ItemExponentialFailureRateLimiter, RateLimiter};

/// Strategy for DNS-1123 style names.
fn k8s_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,30}[a-z0-9]"
}

fn resolve(raw: String) -> Duration {
    let env = move |key: &str| (key == RESYNC_INTERVAL_ENV).then(|| raw.clone());
    resolve_sync_interval(&env)
}

proptest! {
    #[test]
    fn positive_intervals_are_used_as_seconds(secs in 1u32..=86_400) {
        prop_assert_eq!(resolve(secs.to_string()), Duration::from_secs(u64::from(secs)));
    }

    #[test]
    fn non_positive_intervals_use_default(secs in i64::MIN..=0) {
        prop_assert_eq!(resolve(secs.to_string()), DEFAULT_RESYNC_INTERVAL);
    }

    #[test]
    fn non_numeric_intervals_use_default(raw in "[a-zA-Z .:_]{0,12}") {
        prop_assert_eq!(resolve(raw), DEFAULT_RESYNC_INTERVAL);
    }

    #[test]
    fn whitespace_padded_intervals_use_default(secs in 1u32..=86_400, pad in "[ \t]{1,3}") {
        prop_assert_eq!(resolve(format!("{pad}{secs}")), DEFAULT_RESYNC_INTERVAL);
        prop_assert_eq!(resolve(format!("{secs}{pad}")), DEFAULT_RESYNC_INTERVAL);
    }

    #[test]
    fn object_keys_survive_display_and_parse(ns in k8s_name(), name in k8s_name()) {
        let key = ObjectKey::new(&ns, &name);
        let parsed: ObjectKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn backoff_grows_and_is_capped(failures in 1usize..64) {
        let limiter = ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1000),
        );
        let item = "openebs/cspc-a".to_string();
        let mut previous = Duration::ZERO;
        for _ in 0..failures {
            let delay = limiter.when(&item);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= Duration::from_secs(1000));
            previous = delay;
        }
        prop_assert_eq!(limiter.num_requeues(&item) as usize, failures);

        limiter.forget(&item);
        prop_assert_eq!(limiter.when(&item), Duration::from_millis(5));
    }

    #[test]
    fn mirror_accepts_exactly_even_counts(count in 0usize..64) {
        prop_assert_eq!(
            RaidGroupType::Mirror.accepts(count),
            count >= 2 && count % 2 == 0
        );
    }

    #[test]
    fn stripe_accepts_any_nonempty_group(count in 1usize..256) {
        prop_assert!(RaidGroupType::Stripe.accepts(count));
    }
}
