use crate::credentials::{CredentialHints, CredentialResolver};
use crate::registry::{ToolOutput, ToolRegistry};
use reddit_client::RedditConnector;
use reddit_mcp_core::{CoreError, ErrorCategory, ErrorExt};
use rmcp::model::{CallToolResult, Content, Tool};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Failures reported as protocol errors rather than tool results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
}

/// Runs `tools/call` requests: validate, resolve credentials, connect, call.
pub struct ToolDispatcher {
    registry: ToolRegistry,
    resolver: CredentialResolver,
    connector: Arc<dyn RedditConnector>,
}

impl ToolDispatcher {
    pub fn new(
        registry: ToolRegistry,
        resolver: CredentialResolver,
        connector: Arc<dyn RedditConnector>,
    ) -> Self {
        Self {
            registry,
            resolver,
            connector,
        }
    }

    pub fn tool_definitions(&self) -> Vec<Tool> {
        self.registry.definitions()
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        hints: &CredentialHints,
    ) -> Result<CallToolResult, DispatchError> {
        let tool = self.registry.get(name).ok_or_else(|| DispatchError::UnknownTool {
            name: name.to_string(),
        })?;
        let arguments = arguments.unwrap_or_else(|| Value::Object(Map::new()));

        info!("Calling tool {}", name);
        let outcome: Result<ToolOutput, CoreError> = async {
            tool.validate(&arguments)?;
            let resolved = self.resolver.resolve(hints)?;
            let api = self.connector.connect(&resolved.credentials).await?;
            tool.call(api.as_ref(), &arguments).await
        }
        .await;

        Ok(match outcome {
            Ok(output) => {
                let mut result = CallToolResult::success(vec![Content::text(output.text)]);
                result.structured_content = Some(output.structured);
                result
            }
            Err(err) => {
                match err.category() {
                    ErrorCategory::Internal | ErrorCategory::UpstreamError => err.log_error(),
                    _ => err.log_warn(),
                };
                tool_error_result(&err)
            }
        })
    }
}

/// Converts a failure into an `isError` tool result with a structured payload.
pub fn tool_error_result(err: &CoreError) -> CallToolResult {
    let mut error = json!({
        "code": err.error_code(),
        "category": err.category(),
        "message": err.user_friendly_message(),
        "retryable": err.is_retryable(),
    });
    if let Some(retry_after) = err.retry_after() {
        error["retry_after_secs"] = json!(retry_after.as_secs());
    }

    let mut result = CallToolResult::error(vec![Content::text(err.user_friendly_message())]);
    result.structured_content = Some(json!({ "error": error }));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reddit_client::RedditApi;
    use reddit_mcp_core::{Credentials, RedditApiError};

    struct UnreachableConnector;

    #[async_trait]
    impl RedditConnector for UnreachableConnector {
        async fn connect(
            &self,
            _credentials: &Credentials,
        ) -> Result<Box<dyn RedditApi>, CoreError> {
            panic!("connector must not be reached");
        }
    }

    #[test]
    fn test_unknown_tool_rejected_before_resolution() {
        let dispatcher = ToolDispatcher::new(
            ToolRegistry::new(),
            CredentialResolver::new(None),
            Arc::new(UnreachableConnector),
        );
        let result = tokio_test::block_on(dispatcher.call_tool(
            "anything",
            None,
            &CredentialHints::default(),
        ));
        assert!(matches!(result, Err(DispatchError::UnknownTool { name }) if name == "anything"));
        assert!(dispatcher.tool_definitions().is_empty());
    }

    #[test]
    fn test_tool_error_result_shape() {
        let err = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 17 });
        let result = tool_error_result(&err);

        assert_eq!(result.is_error, Some(true));
        let error = &result.structured_content.unwrap()["error"];
        assert_eq!(error["category"], "rate_limited");
        assert_eq!(error["retryable"], true);
        assert_eq!(error["retry_after_secs"], 17);
        assert_eq!(error["code"], err.error_code());
    }

    #[test]
    fn test_missing_credentials_result() {
        let result = tool_error_result(&CoreError::MissingCredentials);
        let error = &result.structured_content.as_ref().unwrap()["error"];

        assert_eq!(error["category"], "authentication");
        assert_eq!(error["retryable"], false);
        assert!(error.get("retry_after_secs").is_none());
        assert_eq!(result.content.len(), 1);
        assert_eq!(
            result.content[0].as_text().map(|t| t.text.as_str()),
            error["message"].as_str()
        );
    }
}
