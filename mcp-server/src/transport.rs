//! Streamable HTTP transport: rmcp's service at `/mcp` plus `/health`, on axum.

use crate::credentials::{
    CredentialHints, CredentialPair, CLIENT_ID_HEADER, CLIENT_ID_PARAM, CLIENT_SECRET_HEADER,
    CLIENT_SECRET_PARAM,
};
use crate::dispatcher::ToolDispatcher;
use crate::handler::{RedditMcpServer, SERVER_NAME, SERVER_VERSION};
use axum::{
    extract::Query,
    http::{header, request::Parts, HeaderName, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use reddit_mcp_core::CoreError;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub const MCP_PATH: &str = "/mcp";
pub const HEALTH_PATH: &str = "/health";
pub const TRANSPORT_NAME: &str = "streamable-http";

/// Builds the router. Shared by `serve` and the tests.
///
/// The MCP service runs stateless: every POST is answered on its own, so
/// credentials are always taken from the request that carries the call.
pub fn build_router(dispatcher: Arc<ToolDispatcher>) -> Router {
    let mcp_service = StreamableHttpService::new(
        move || Ok(RedditMcpServer::new(dispatcher.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("mcp-protocol-version"),
            HeaderName::from_static(CLIENT_ID_HEADER),
            HeaderName::from_static(CLIENT_SECRET_HEADER),
        ]);

    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .nest_service(MCP_PATH, mcp_service)
        .layer(cors)
}

/// Binds `addr` and serves until Ctrl-C or SIGTERM.
pub async fn serve(addr: &str, router: Router) -> Result<(), CoreError> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        "MCP endpoint listening on http://{}{}",
        listener.local_addr()?,
        MCP_PATH
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Credential hints from the query string and the `X-Reddit-Client-*` headers
/// of the HTTP request behind a tool call.
pub fn credential_hints(parts: &Parts) -> CredentialHints {
    let query: HashMap<String, String> = Query::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .unwrap_or_default();
    let header_value = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    CredentialHints {
        query: CredentialPair::new(
            query.get(CLIENT_ID_PARAM).cloned(),
            query.get(CLIENT_SECRET_PARAM).cloned(),
        ),
        headers: CredentialPair::new(
            header_value(CLIENT_ID_HEADER),
            header_value(CLIENT_SECRET_HEADER),
        ),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "server": SERVER_NAME,
        "version": SERVER_VERSION,
        "transport": TRANSPORT_NAME,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
