//! Minimal in-process stand-in for the Kubernetes API server.
//!
//! Serves just enough of the REST surface for startup and repeated syncs:
//! the CStorPoolCluster list and watch, BlockDevice gets, CSPC status
//! patches (recorded for assertions) and event writes. Like a real API
//! server, a status patch bumps the resourceVersion and reaches watchers as
//! a MODIFIED event only when it actually changes the stored object.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use cspc_operator::crd::{BlockDevice, CStorPoolCluster};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

#[derive(Clone)]
struct FakeState {
    cspcs: Arc<Mutex<Vec<Value>>>,
    block_devices: Arc<Vec<Value>>,
    status_patches: Arc<Mutex<Vec<Value>>>,
    resource_version: Arc<AtomicU64>,
    modified: broadcast::Sender<Value>,
    failing: bool,
}

impl FakeState {
    fn new(cspcs: Vec<Value>, block_devices: Vec<Value>, failing: bool) -> Self {
        let resource_version = Arc::new(AtomicU64::new(1));
        let cspcs = cspcs
            .into_iter()
            .map(|mut obj| {
                let rv = resource_version.fetch_add(1, Ordering::SeqCst) + 1;
                obj["metadata"]["resourceVersion"] = json!(rv.to_string());
                obj
            })
            .collect();
        let (modified, _) = broadcast::channel(64);
        Self {
            cspcs: Arc::new(Mutex::new(cspcs)),
            block_devices: Arc::new(block_devices),
            status_patches: Arc::new(Mutex::new(Vec::new())),
            resource_version,
            modified,
            failing,
        }
    }
}

pub struct FakeApiServer {
    addr: SocketAddr,
    state: FakeState,
}

impl FakeApiServer {
    /// Serve the given objects.
    pub async fn start(cspcs: Vec<CStorPoolCluster>, block_devices: Vec<BlockDevice>) -> Self {
        let state = FakeState::new(
            cspcs
                .iter()
                .map(|c| serde_json::to_value(c).unwrap())
                .collect(),
            block_devices
                .iter()
                .map(|b| serde_json::to_value(b).unwrap())
                .collect(),
            false,
        );
        Self::serve(state).await
    }

    /// Answer every request with a 500, so caches never sync.
    pub async fn start_failing() -> Self {
        Self::serve(FakeState::new(Vec::new(), Vec::new(), true)).await
    }

    async fn serve(state: FakeState) -> Self {
        let app = Router::new()
            .route(
                "/apis/openebs.io/v1alpha1/cstorpoolclusters",
                get(list_or_watch_cspcs),
            )
            .route(
                "/apis/openebs.io/v1alpha1/namespaces/{ns}/cstorpoolclusters",
                get(list_or_watch_cspcs),
            )
            .route(
                "/apis/openebs.io/v1alpha1/namespaces/{ns}/cstorpoolclusters/{name}/status",
                patch(patch_cspc_status),
            )
            .route(
                "/apis/openebs.io/v1alpha1/namespaces/{ns}/blockdevices/{name}",
                get(get_block_device),
            )
            .route(
                "/apis/events.k8s.io/v1/namespaces/{ns}/events",
                post(echo_event),
            )
            .route(
                "/apis/events.k8s.io/v1/namespaces/{ns}/events/{name}",
                patch(echo_event),
            )
            .fallback(|| async { not_found() })
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Write a kubeconfig pointing at this server into `dir`.
    pub fn write_kubeconfig(&self, dir: &Path) -> PathBuf {
        let path = dir.join("kubeconfig");
        let contents = format!(
            r#"apiVersion: v1
kind: Config
clusters:
  - name: fake
    cluster:
      server: http://{addr}
contexts:
  - name: fake
    context:
      cluster: fake
      user: fake
current-context: fake
users:
  - name: fake
    user:
      token: fake-token
"#,
            addr = self.addr
        );
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// First CSPC status patch received, if one arrives within `timeout`.
    pub async fn wait_for_status_patch(&self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if let Some(patch) = self.state.status_patches.lock().unwrap().first() {
                return Some(patch.clone());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        None
    }

    /// Number of CSPC status patches received so far.
    pub fn status_patch_count(&self) -> usize {
        self.state.status_patches.lock().unwrap().len()
    }
}

fn status(code: u16, reason: &str, message: &str) -> Response {
    let body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code,
    });
    let code = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(body)).into_response()
}

fn not_found() -> Response {
    status(404, "NotFound", "the server could not find the requested resource")
}

fn resource_version(obj: &Value) -> u64 {
    obj["metadata"]["resourceVersion"]
        .as_str()
        .and_then(|rv| rv.parse().ok())
        .unwrap_or(0)
}

fn modified_line(obj: Value) -> Result<Bytes, Infallible> {
    let event = json!({ "type": "MODIFIED", "object": obj });
    Ok(Bytes::from(format!("{}\n", event)))
}

async fn list_or_watch_cspcs(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if state.failing {
        return status(500, "InternalError", "fake failure");
    }

    let watching = params
        .get("watch")
        .is_some_and(|w| w == "true" || w == "1");
    if watching {
        // Subscribe first so nothing falls between the backlog and live events
        let live = state.modified.subscribe();
        let since: u64 = params
            .get("resourceVersion")
            .and_then(|rv| rv.parse().ok())
            .unwrap_or(0);
        let backlog: Vec<Value> = state
            .cspcs
            .lock()
            .unwrap()
            .iter()
            .filter(|obj| resource_version(obj) > since)
            .cloned()
            .collect();

        let live = futures::stream::unfold(live, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(obj) => return Some((modified_line(obj), rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        let events = futures::stream::iter(backlog.into_iter().map(modified_line)).chain(live);
        return (StatusCode::OK, Body::from_stream(events)).into_response();
    }

    let items = state.cspcs.lock().unwrap().clone();
    Json(json!({
        "apiVersion": "openebs.io/v1alpha1",
        "kind": "CStorPoolClusterList",
        "metadata": {
            "resourceVersion": state.resource_version.load(Ordering::SeqCst).to_string()
        },
        "items": items,
    }))
    .into_response()
}

async fn get_block_device(
    State(state): State<FakeState>,
    UrlPath((ns, name)): UrlPath<(String, String)>,
) -> Response {
    state
        .block_devices
        .iter()
        .find(|bd| {
            bd["metadata"]["name"] == name.as_str() && bd["metadata"]["namespace"] == ns.as_str()
        })
        .map(|bd| Json(bd.clone()).into_response())
        .unwrap_or_else(not_found)
}

async fn patch_cspc_status(
    State(state): State<FakeState>,
    UrlPath((ns, name)): UrlPath<(String, String)>,
    body: Bytes,
) -> Response {
    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return status(400, "BadRequest", "patch body is not JSON");
    };
    state.status_patches.lock().unwrap().push(body.clone());

    let mut cspcs = state.cspcs.lock().unwrap();
    let Some(cspc) = cspcs
        .iter_mut()
        .find(|c| c["metadata"]["name"] == name.as_str() && c["metadata"]["namespace"] == ns.as_str())
    else {
        return not_found();
    };

    if cspc["status"] != body["status"] {
        cspc["status"] = body["status"].clone();
        let rv = state.resource_version.fetch_add(1, Ordering::SeqCst) + 1;
        cspc["metadata"]["resourceVersion"] = json!(rv.to_string());
        // No receivers just means no watch is open yet
        let _ = state.modified.send(cspc.clone());
    }
    Json(cspc.clone()).into_response()
}

async fn echo_event(body: Bytes) -> Response {
    (StatusCode::CREATED, body).into_response()
}
