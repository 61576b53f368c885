//! HTTP surface over a [`Network`].

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use filechain_core::Fingerprint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{constants::MAX_UPLOAD_BYTES, Network, NodeError};

type AppState = Arc<Network>;

pub struct ApiError(NodeError);

impl From<NodeError> for ApiError {
    fn from(e: NodeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_network_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status != StatusCode::BAD_REQUEST {
            warn!(error = %self.0, "request failed");
        }
        let body = Json(json!({ "success": false, "message": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct AddNode {
    pub node_id: String,
    pub port: u16,
}

#[derive(Deserialize)]
pub struct UploadParams {
    pub name: String,
}

#[derive(Deserialize)]
pub struct RequestFile {
    pub peer_id: String,
    pub fingerprint: Fingerprint,
}

#[derive(Deserialize)]
pub struct Hack {
    pub block_index: usize,
}

pub fn router(network: Arc<Network>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/api/nodes", get(list_nodes).post(add_node))
        .route("/api/nodes/{id}/files", post(upload_file))
        .route("/api/nodes/{id}/files/verify", get(verify_files))
        .route("/api/nodes/{id}/request", post(request_file))
        .route("/api/nodes/{id}/chain", get(chain))
        .route("/api/nodes/{id}/integrity", get(integrity))
        .route("/api/nodes/{id}/hack", post(simulate_hack))
        .route("/api/notifications", get(notifications))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(network)
}

async fn add_node(State(network): State<AppState>, Json(req): Json<AddNode>) -> ApiResult {
    let node = network.add_node(&req.node_id, req.port).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("node {} listening on port {}", node.id(), node.port()),
        "port": node.port(),
    })))
}

async fn list_nodes(State(network): State<AppState>) -> ApiResult {
    let nodes = network.list_nodes()?;
    Ok(Json(json!({ "success": true, "nodes": nodes })))
}

async fn upload_file(
    State(network): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult {
    let node = network.get(&id)?;
    let fingerprint = node.publish(&params.name, &body).await?;
    Ok(Json(json!({ "success": true, "fingerprint": fingerprint })))
}

async fn request_file(
    State(network): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RequestFile>,
) -> ApiResult {
    let node = network.get(&id)?;
    node.request_file(&req.peer_id, &req.fingerprint).await?;
    Ok(Json(json!({ "success": true, "message": "file transferred" })))
}

async fn chain(State(network): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let view = network.get(&id)?.chain_view();
    Ok(Json(json!({ "success": true, "chain": view })))
}

async fn integrity(State(network): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let report = network.get(&id)?.check_integrity();
    Ok(Json(json!({ "success": true, "node_id": id, "integrity": report })))
}

async fn simulate_hack(
    State(network): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<Hack>,
) -> ApiResult {
    let outcome = network.get(&id)?.simulate_hack(req.block_index).await?;
    Ok(Json(json!({ "success": true, "node_id": id, "hack_result": outcome })))
}

async fn verify_files(State(network): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let alerts = network.get(&id)?.verify_files()?;
    Ok(Json(json!({
        "success": true,
        "node_id": id,
        "has_alerts": !alerts.is_empty(),
        "alerts": alerts,
    })))
}

async fn notifications(State(network): State<AppState>) -> ApiResult {
    let notifications = network.notifications();
    Ok(Json(json!({
        "success": true,
        "has_notifications": !notifications.is_empty(),
        "notifications": notifications,
    })))
}
