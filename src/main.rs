use mcp_server::{build_app, serve};
use reddit_client::RedditClientFactory;
use reddit_mcp_core::{CoreError, ErrorExt, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "reddit_mcp=info,mcp_server=info,reddit_client=info";

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Reddit MCP server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env().map_err(|e| {
        let err = CoreError::from(e);
        err.log_error();
        err
    })?;

    if config.default_credentials.is_some() {
        tracing::info!("Default Reddit credentials loaded from the environment");
    } else {
        tracing::warn!("No default Reddit credentials; every request must supply its own");
    }

    let connector = RedditClientFactory::new(config.reddit.clone())?;
    let app = build_app(&config, Arc::new(connector))?;

    serve(&config.listen_addr(), app).await.inspect_err(|e| {
        e.log_error();
    })
}
