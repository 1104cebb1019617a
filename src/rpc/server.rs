//! RPC HTTP Server
//!
//! Axum-based HTTP server that answers JSON-RPC requests on `POST /`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use log::info;
use tower_http::cors::{Any, CorsLayer};

use crate::node::Node;
use crate::rpc::methods::{handle_request, JsonRpcRequest, JsonRpcResponse};

/// Build the RPC router
pub fn rpc_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handle_rpc))
        .layer(cors)
        .with_state(node)
}

/// Start the RPC server on the specified port
pub async fn start_rpc_server(node: Arc<Node>, port: u16) -> io::Result<()> {
    let addr = SocketAddr::new(node.config().listen_ip, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("RPC server listening on http://{}", addr);
    axum::serve(listener, rpc_router(node)).await
}

/// Handle incoming JSON-RPC requests
async fn handle_rpc(
    State(node): State<Arc<Node>>,
    Json(request): Json<JsonRpcRequest>,
) -> (StatusCode, Json<JsonRpcResponse>) {
    let response = handle_request(&node, request).await;
    (StatusCode::OK, Json(response))
}
