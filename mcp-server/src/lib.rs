//! MCP server exposing read-only Reddit tools over Streamable HTTP.

pub mod credentials;
pub mod dispatcher;
pub mod handler;
pub mod registry;
pub mod tools;
pub mod transport;

pub use credentials::{CredentialHints, CredentialPair, CredentialResolver, CredentialSource};
pub use dispatcher::{tool_error_result, DispatchError, ToolDispatcher};
pub use handler::RedditMcpServer;
pub use registry::{ToolHandler, ToolOutput, ToolRegistry};
pub use transport::{build_router, serve};

use reddit_client::RedditConnector;
use reddit_mcp_core::{CoreError, Credentials, ServerConfig};
use std::sync::Arc;
use tools::{HotThreadsTool, PostContentTool};

/// Registry holding every tool this server offers.
pub fn build_registry() -> Result<ToolRegistry, CoreError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(HotThreadsTool))?;
    registry.register(Arc::new(PostContentTool))?;
    Ok(registry)
}

pub fn build_dispatcher(
    config: &ServerConfig,
    connector: Arc<dyn RedditConnector>,
) -> Result<ToolDispatcher, CoreError> {
    let defaults = config.default_credentials.as_ref().map(Credentials::duplicate);
    Ok(ToolDispatcher::new(
        build_registry()?,
        CredentialResolver::new(defaults),
        connector,
    ))
}

/// Router for `config`, ready to serve.
pub fn build_app(
    config: &ServerConfig,
    connector: Arc<dyn RedditConnector>,
) -> Result<axum::Router, CoreError> {
    let dispatcher = build_dispatcher(config, connector)?;
    Ok(build_router(Arc::new(dispatcher)))
}
