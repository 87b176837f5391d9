use async_trait::async_trait;
use reddit_client::RedditApi;
use reddit_mcp_core::CoreError;
use rmcp::model::{JsonObject, Tool};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a successful tool call: a text rendering for the model and the
/// structured payload matching the tool's output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Value,
}

/// Builds the advertised definition of a tool from JSON schema literals.
pub fn tool_definition(
    name: &'static str,
    description: &'static str,
    input_schema: Value,
    output_schema: Option<Value>,
) -> Tool {
    let mut tool = Tool::new(name, description, schema_object(input_schema));
    tool.output_schema = output_schema.map(schema_object);
    tool
}

fn schema_object(schema: Value) -> Arc<JsonObject> {
    match schema {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

/// A tool exposed over MCP.
///
/// `validate` runs before credentials are resolved, so argument errors never
/// cost an upstream round trip.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> Tool;

    fn validate(&self, arguments: &Value) -> Result<(), CoreError>;

    async fn call(&self, api: &dyn RedditApi, arguments: &Value) -> Result<ToolOutput, CoreError>;
}

/// Tool name to handler, populated once at start-up.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<(), CoreError> {
        let name = handler.definition().name.to_string();
        if self.tools.contains_key(&name) {
            return Err(CoreError::Internal {
                message: format!("tool '{}' registered twice", name),
            });
        }
        self.tools.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    /// Definitions in name order.
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool(&'static str);

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> Tool {
            tool_definition(self.0, "echo", json!({"type": "object"}), None)
        }

        fn validate(&self, _arguments: &Value) -> Result<(), CoreError> {
            Ok(())
        }

        async fn call(
            &self,
            _api: &dyn RedditApi,
            arguments: &Value,
        ) -> Result<ToolOutput, CoreError> {
            Ok(ToolOutput {
                text: arguments.to_string(),
                structured: arguments.clone(),
            })
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(EchoTool("zeta"))).unwrap();
        registry.register(Arc::new(EchoTool("alpha"))).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("missing").is_none());

        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name.to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_tool_definition_schemas() {
        let tool = tool_definition(
            "echo",
            "repeats its input",
            json!({"type": "object", "required": ["x"]}),
            Some(json!({"type": "object"})),
        );
        assert_eq!(tool.name, "echo");
        assert_eq!(tool.description.as_deref(), Some("repeats its input"));
        assert_eq!(tool.input_schema.get("required"), Some(&json!(["x"])));
        assert!(tool.output_schema.is_some());

        let bare = tool_definition("bare", "no schema", json!(null), None);
        assert!(bare.input_schema.is_empty());
        assert!(bare.output_schema.is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool("dup"))).unwrap();

        let result = registry.register(Arc::new(EchoTool("dup")));
        assert!(matches!(result, Err(CoreError::Internal { .. })));
        assert_eq!(registry.len(), 1);
    }
}
