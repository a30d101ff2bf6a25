//! Command surface shared by the CLI and the MCP server
//!
//! Each tool takes typed, JSON-deserializable parameters and works against a
//! [`ToolContext`]: the browser session (when one is attached), the result
//! store and the scrape settings.

pub mod export_csv;
pub mod extract_product;
pub mod extract_reviews;
pub mod navigate;
pub mod utils;

pub use export_csv::{ExportCsvParams, ExportCsvTool};
pub use extract_product::{ExtractProductParams, ExtractProductTool};
pub use extract_reviews::{ExtractReviewsParams, ExtractReviewsTool};
pub use navigate::{NavigateParams, NavigateTool};

use crate::{browser::BrowserSession,
            error::{Result, ScrapeError},
            pagination::ScrapeConfig,
            store::ScrapeStore};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Everything a tool may touch while it runs
pub struct ToolContext<'a> {
    session: Option<&'a BrowserSession>,
    pub store: &'a mut ScrapeStore,
    pub config: ScrapeConfig,
}

impl<'a> ToolContext<'a> {
    pub fn new(session: &'a BrowserSession, store: &'a mut ScrapeStore) -> Self {
        Self {
            session: Some(session),
            store,
            config: ScrapeConfig::default(),
        }
    }

    /// Context for tools that only work on stored results
    pub fn offline(store: &'a mut ScrapeStore) -> Self {
        Self {
            session: None,
            store,
            config: ScrapeConfig::default(),
        }
    }

    /// Builder method: scrape settings
    pub fn with_config(mut self, config: ScrapeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn session(&self) -> Result<&'a BrowserSession> {
        self.session
            .ok_or_else(|| ScrapeError::TabOperationFailed("No browser session attached".to_string()))
    }
}

/// Outcome of one tool invocation
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn success_with(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

pub trait Tool: Send + Sync {
    type Params: DeserializeOwned + JsonSchema;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn execute_typed(&self, params: Self::Params, context: &mut ToolContext) -> Result<ToolResult>;

    /// JSON schema of [`Tool::Params`]
    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(Self::Params)).unwrap_or_default()
    }

    /// Decode raw JSON parameters and run
    fn execute(&self, params: Value, context: &mut ToolContext) -> Result<ToolResult> {
        let params = serde_json::from_value(params).map_err(|e| ScrapeError::ToolExecutionFailed {
            tool: self.name().to_string(),
            reason: format!("Invalid parameters: {}", e),
        })?;
        self.execute_typed(params, context)
    }
}

/// Object-safe view of a [`Tool`] for the registry
trait DynTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    fn execute(&self, params: Value, context: &mut ToolContext) -> Result<ToolResult>;
}

impl<T: Tool> DynTool for T {
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn description(&self) -> &str {
        Tool::description(self)
    }

    fn parameters_schema(&self) -> Value {
        Tool::parameters_schema(self)
    }

    fn execute(&self, params: Value, context: &mut ToolContext) -> Result<ToolResult> {
        Tool::execute(self, params, context)
    }
}

/// Summary of a registered tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tools by name, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Box<dyn DynTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NavigateTool);
        registry.register(ExtractReviewsTool);
        registry.register(ExtractProductTool);
        registry.register(ExportCsvTool);
        registry
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(Tool::name(&tool).to_string(), Box::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub fn execute(&self, name: &str, params: Value, context: &mut ToolContext) -> Result<ToolResult> {
        let tool = self.tools.get(name).ok_or_else(|| ScrapeError::ToolExecutionFailed {
            tool: name.to_string(),
            reason: "Unknown tool".to_string(),
        })?;

        log::debug!("Executing tool {}", name);
        tool.execute(params, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_registry() {
        let registry = ToolRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["navigate", "extract_reviews", "extract_product", "export_csv"]
        );
        assert!(registry.list().iter().all(|t| t.parameters.is_object()));
    }

    #[test]
    fn test_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ScrapeStore::open(dir.path().join("store.json")).unwrap();
        let mut context = ToolContext::offline(&mut store);

        let result = ToolRegistry::with_defaults().execute("screenshot", json!({}), &mut context);
        assert!(matches!(result, Err(ScrapeError::ToolExecutionFailed { .. })));
    }

    #[test]
    fn test_browser_tool_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ScrapeStore::open(dir.path().join("store.json")).unwrap();
        let mut context = ToolContext::offline(&mut store);

        let result = ToolRegistry::with_defaults().execute("navigate", json!({"url": "amazon.com"}), &mut context);
        assert!(matches!(result, Err(ScrapeError::TabOperationFailed(_))));
    }

    #[test]
    fn test_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ScrapeStore::open(dir.path().join("store.json")).unwrap();
        let mut context = ToolContext::offline(&mut store);

        let result = ToolRegistry::with_defaults().execute("navigate", json!({"link": 1}), &mut context);
        assert!(matches!(result, Err(ScrapeError::ToolExecutionFailed { .. })));
    }
}
