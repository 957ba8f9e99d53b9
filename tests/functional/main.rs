// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the operator startup sequence.
//!
//! These tests drive `start_with_signal` end to end WITHOUT a live
//! Kubernetes cluster. An in-process axum server stands in for the API
//! server and a temporary kubeconfig points the operator at it.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run with verbose output
//! cargo test --test functional -- --nocapture
//! ```

#[path = "../common/mod.rs"]
mod common;

mod fake_api;

use std::sync::Arc;
use std::time::Duration;

use cspc_operator::app::{OperatorConfig, RESYNC_INTERVAL_ENV, start_with_signal};
use cspc_operator::client::{ClientFamily, ClientSet, OpenebsClient, resolve_config};
use cspc_operator::health::Phase;
use cspc_operator::{Error, HealthState};
use kube::api::ListParams;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::fixtures::{active_block_device, striped_cspc};
use fake_api::FakeApiServer;

/// Environment without RESYNC_INTERVAL
fn no_env(_: &str) -> Option<String> {
    None
}

/// Environment resyncing every second
fn fast_resync(key: &str) -> Option<String> {
    (key == RESYNC_INTERVAL_ENV).then(|| "1".to_string())
}

fn config_for(kubeconfig: &std::path::Path) -> OperatorConfig {
    OperatorConfig {
        kubeconfig: Some(kubeconfig.to_path_buf()),
        cache_sync_timeout_secs: 5,
        ..Default::default()
    }
}

async fn wait_until_ready(health: &HealthState) {
    tokio::time::timeout(Duration::from_secs(5), health.wait_for(Phase::Ready))
        .await
        .expect("operator never became ready");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_blocks_until_stop_then_returns_ok() {
    let server = FakeApiServer::start(Vec::new(), Vec::new()).await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());

    let health = Arc::new(HealthState::new());
    let stop = CancellationToken::new();
    let handle = {
        let health = health.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            start_with_signal(&config_for(&kubeconfig), &no_env, Some(health), stop).await
        })
    };

    wait_until_ready(&health).await;
    assert!(!handle.is_finished(), "run returned before stop");

    stop.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("startup returns after stop")
        .unwrap();
    assert!(result.is_ok(), "unexpected error: {:?}", result);
    assert_eq!(health.phase(), Phase::Stopping);
    assert_eq!(health.metrics.workers_active.get(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cspc_is_synced_and_status_patched() {
    let cspc = striped_cspc("cspc-a", "openebs", "bd-1");
    let bd = active_block_device("bd-1", "openebs", "worker-1");
    let server = FakeApiServer::start(vec![cspc], vec![bd]).await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());

    let stop = CancellationToken::new();
    let handle = {
        let stop = stop.clone();
        tokio::spawn(async move {
            start_with_signal(&config_for(&kubeconfig), &no_env, None, stop).await
        })
    };

    let patch = server
        .wait_for_status_patch(Duration::from_secs(10))
        .await
        .expect("status patched");
    assert_eq!(patch["status"]["desiredInstances"], 1);
    assert_eq!(patch["status"]["conditions"][0]["type"], "Synced");
    assert_eq!(patch["status"]["conditions"][0]["status"], "True");

    stop.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_cspc_reports_condition() {
    let mut cspc = striped_cspc("cspc-bad", "openebs", "bd-1");
    cspc.spec.pools[0].raid_groups[0].type_ = Some("mirror".to_string());
    let server = FakeApiServer::start(vec![cspc], Vec::new()).await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());

    let stop = CancellationToken::new();
    let handle = {
        let stop = stop.clone();
        tokio::spawn(async move {
            start_with_signal(&config_for(&kubeconfig), &no_env, None, stop).await
        })
    };

    let patch = server
        .wait_for_status_patch(Duration::from_secs(10))
        .await
        .expect("status patched");
    assert_eq!(patch["status"]["conditions"][0]["status"], "False");
    assert_eq!(patch["status"]["conditions"][0]["reason"], "InvalidSpec");

    stop.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clients_reach_api_server() {
    let server = FakeApiServer::start(vec![striped_cspc("cspc-a", "openebs", "bd-1")], Vec::new()).await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());

    let connection = resolve_config(Some(&kubeconfig)).await.unwrap();
    let client = OpenebsClient::new_for_config(&connection).unwrap();
    let listed = client
        .cstor_pool_clusters("openebs")
        .list(&ListParams::default())
        .await
        .unwrap();
    assert_eq!(listed.items.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unchanged_status_is_not_rewritten() {
    let cspc = striped_cspc("cspc-a", "openebs", "bd-1");
    let bd = active_block_device("bd-1", "openebs", "worker-1");
    let server = FakeApiServer::start(vec![cspc], vec![bd]).await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());

    let stop = CancellationToken::new();
    let handle = {
        let stop = stop.clone();
        tokio::spawn(async move {
            start_with_signal(&config_for(&kubeconfig), &fast_resync, None, stop).await
        })
    };

    server
        .wait_for_status_patch(Duration::from_secs(10))
        .await
        .expect("status patched");

    // The patch comes back as a watch update and resyncs fire every second
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(server.status_patch_count(), 1);

    stop.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_cspc_status_is_not_rewritten() {
    let mut cspc = striped_cspc("cspc-bad", "openebs", "bd-1");
    cspc.spec.pools[0].raid_groups[0].type_ = Some("mirror".to_string());
    let server = FakeApiServer::start(vec![cspc], Vec::new()).await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());

    let stop = CancellationToken::new();
    let handle = {
        let stop = stop.clone();
        tokio::spawn(async move {
            start_with_signal(&config_for(&kubeconfig), &fast_resync, None, stop).await
        })
    };

    server
        .wait_for_status_patch(Duration::from_secs(10))
        .await
        .expect("status patched");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(server.status_patch_count(), 1);

    stop.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_missing_kubeconfig_aborts_startup() {
    let config = OperatorConfig {
        kubeconfig: Some("/nonexistent/cspc-operator/kubeconfig".into()),
        ..Default::default()
    };
    let err = start_with_signal(&config, &no_env, None, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Kubeconfig { .. }), "got {:?}", err);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unsyncable_cache_fails_startup() {
    let server = FakeApiServer::start_failing().await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());
    let config = OperatorConfig {
        cache_sync_timeout_secs: 1,
        ..config_for(&kubeconfig)
    };

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        start_with_signal(&config, &no_env, None, CancellationToken::new()),
    )
    .await
    .expect("startup gives up after the sync timeout")
    .unwrap_err();
    assert!(matches!(err, Error::CacheSync(_)), "got {:?}", err);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_before_sync_returns_error() {
    let server = FakeApiServer::start_failing().await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = server.write_kubeconfig(dir.path());

    let stop = CancellationToken::new();
    stop.cancel();
    let err = start_with_signal(&config_for(&kubeconfig), &no_env, None, stop)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CacheSync(_)));
}

#[test]
fn test_client_families_are_distinct() {
    let names: Vec<String> = [
        ClientFamily::Kubernetes,
        ClientFamily::Openebs,
        ClientFamily::Ndm,
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(names, vec!["kubernetes", "openebs", "ndm"]);
}
