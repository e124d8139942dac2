//! In-process HTTP server emulating the catalog API and archive hosting.
//!
//! Provides endpoints for:
//! - `GET /api/3/action/resource_show?id=<resource>` - catalog lookup
//! - `GET /files/:name` - archive download honouring `Range: bytes=a-b`

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tokio::task::JoinHandle;

#[derive(Default)]
struct ServerState {
    base_url: String,
    /// resource id -> archive URL returned by the catalog
    resources: Mutex<HashMap<String, String>>,
    /// resource ids answered with `success: false`
    failing: Mutex<Vec<String>>,
    archives: Mutex<HashMap<String, Bytes>>,
    lookups: Mutex<HashMap<String, usize>>,
    catalog_requests: AtomicUsize,
    range_requests: AtomicUsize,
}

/// Running test server; shut down when dropped.
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("test server address");

        let state = Arc::new(ServerState {
            base_url: format!("http://{addr}"),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/3/action/resource_show", get(resource_show))
            .route("/files/:name", get(archive))
            .layer(Extension(state.clone()));

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Catalog API base, as used for `CATALOG_BASE_URL`.
    pub fn catalog_url(&self) -> String {
        format!("{}/api/3", self.base_url())
    }

    /// URL under which an archive added with `add_archive(name, ..)` is served.
    pub fn archive_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base_url(), name)
    }

    pub fn add_archive(&self, name: &str, data: impl Into<Bytes>) {
        lock(&self.state.archives).insert(name.to_string(), data.into());
    }

    /// Resolve `resource_id` to the archive served as `archive_name`.
    pub fn add_resource(&self, resource_id: &str, archive_name: &str) {
        let url = self.archive_url(archive_name);
        self.add_resource_url(resource_id, &url);
    }

    /// Resolve `resource_id` to an arbitrary URL.
    pub fn add_resource_url(&self, resource_id: &str, url: &str) {
        lock(&self.state.resources).insert(resource_id.to_string(), url.to_string());
    }

    /// Answer lookups of `resource_id` with `success: false`.
    pub fn fail_resource(&self, resource_id: &str) {
        lock(&self.state.failing).push(resource_id.to_string());
    }

    /// Total catalog lookups received.
    pub fn catalog_requests(&self) -> usize {
        self.state.catalog_requests.load(Ordering::SeqCst)
    }

    /// Catalog lookups received for one resource id.
    pub fn lookups_for(&self, resource_id: &str) -> usize {
        lock(&self.state.lookups)
            .get(resource_id)
            .copied()
            .unwrap_or(0)
    }

    /// Archive range requests received.
    pub fn range_requests(&self) -> usize {
        self.state.range_requests.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// GET /api/3/action/resource_show
async fn resource_show(
    Extension(state): Extension<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.catalog_requests.fetch_add(1, Ordering::SeqCst);
    let id = params.get("id").cloned().unwrap_or_default();
    *lock(&state.lookups).entry(id.clone()).or_default() += 1;

    if lock(&state.failing).contains(&id) {
        return Json(json!({
            "success": false,
            "error": { "message": "Not found", "__type": "Not Found Error" }
        }))
        .into_response();
    }

    match lock(&state.resources).get(&id) {
        Some(url) => Json(json!({
            "help": format!("{}/api/3/action/help_show?name=resource_show", state.base_url),
            "success": true,
            "result": { "id": id, "url": url, "format": "ZIP" }
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": { "message": "Not found", "__type": "Not Found Error" }
            })),
        )
            .into_response(),
    }
}

/// GET /files/:name
async fn archive(
    Extension(state): Extension<Arc<ServerState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(data) = lock(&state.archives).get(&name).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);

    let Some((start, end)) = range else {
        return (StatusCode::OK, [(header::ACCEPT_RANGES, "bytes")], data).into_response();
    };

    state.range_requests.fetch_add(1, Ordering::SeqCst);
    let total = data.len() as u64;
    if start >= total {
        return (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{total}"))],
        )
            .into_response();
    }
    let end = end.min(total - 1);

    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}")),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        data.slice(start as usize..=end as usize),
    )
        .into_response()
}

/// `bytes=a-b` -> (a, b)
fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    (start <= end).then_some((start, end))
}
