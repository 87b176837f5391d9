//! The rmcp server handler: tool listing and tool calls backed by [`ToolDispatcher`].

use crate::dispatcher::ToolDispatcher;
use crate::transport::credential_hints;
use axum::http::request::Parts;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ErrorData as McpError, Implementation,
    ListToolsResult, PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub const SERVER_NAME: &str = "reddit-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const INSTRUCTIONS: &str = "Read-only access to Reddit. Use fetch_reddit_hot_threads to list \
    the hot threads of a subreddit and fetch_reddit_post_content to read a post with its top \
    comments. Reddit API credentials may be passed as client_id/client_secret query parameters \
    or X-Reddit-Client-ID/X-Reddit-Client-Secret headers.";

#[derive(Clone)]
pub struct RedditMcpServer {
    dispatcher: Arc<ToolDispatcher>,
}

impl RedditMcpServer {
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl ServerHandler for RedditMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(
            self.dispatcher.tool_definitions(),
        ))
    }

    /// Credentials come from the HTTP request that carried the call.
    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let hints = context
            .extensions
            .get::<Parts>()
            .map(credential_hints)
            .unwrap_or_default();
        let arguments = request.arguments.map(Value::Object);
        let request_id = Uuid::new_v4();

        self.dispatcher
            .call_tool(&request.name, arguments, &hints)
            .instrument(info_span!("tool_call", %request_id, tool = %request.name))
            .await
            .map_err(|e| {
                warn!("Rejecting tool call: {}", e);
                McpError::invalid_params(e.to_string(), None)
            })
    }
}
