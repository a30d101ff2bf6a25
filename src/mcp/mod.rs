//! MCP (Model Context Protocol) server
//!
//! Exposes the tool registry to MCP clients. Each MCP tool forwards its
//! parameters to the registry tool of the same purpose.

pub mod handler;
pub use handler::ScraperServer;

use crate::tools::{ExportCsvParams, ExtractProductParams, ExtractReviewsParams, NavigateParams, ToolContext,
                   ToolResult as InternalToolResult};
use handler::ServerState;
use rmcp::{ErrorData as McpError,
           handler::server::wrapper::Parameters,
           model::{CallToolResult, Content},
           tool, tool_router};
use serde::Serialize;

/// Convert internal ToolResult to MCP CallToolResult
fn convert_result(result: InternalToolResult) -> Result<CallToolResult, McpError> {
    if result.success {
        let text = match result.data {
            Some(data) => serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string()),
            None => "Success".to_string(),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    } else {
        let error_msg = result.error.unwrap_or_else(|| "Unknown error".to_string());
        Err(McpError::internal_error(error_msg, None))
    }
}

impl ScraperServer {
    fn run_tool(&self, name: &str, params: impl Serialize) -> Result<CallToolResult, McpError> {
        let params = serde_json::to_value(params).map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let mut state = self
            .state
            .lock()
            .map_err(|_| McpError::internal_error("Server state is poisoned", None))?;
        let ServerState {
            session,
            store,
            config,
            registry,
        } = &mut *state;

        let mut context = ToolContext::new(session, store).with_config(config.clone());
        let result = registry
            .execute(name, params, &mut context)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        convert_result(result)
    }
}

#[tool_router]
impl ScraperServer {
    #[tool(description = "Navigate the browser to a URL")]
    fn amz_navigate(&self, params: Parameters<NavigateParams>) -> Result<CallToolResult, McpError> {
        self.run_tool("navigate", params.0)
    }

    #[tool(description = "Scrape all reviews of an Amazon product, following review pagination, and store them")]
    fn amz_extract_reviews(&self, params: Parameters<ExtractReviewsParams>) -> Result<CallToolResult, McpError> {
        self.run_tool("extract_reviews", params.0)
    }

    #[tool(description = "Extract product details (price, images, specifications, variations) and store them")]
    fn amz_extract_product(&self, params: Parameters<ExtractProductParams>) -> Result<CallToolResult, McpError> {
        self.run_tool("extract_product", params.0)
    }

    #[tool(description = "Export stored reviews and product details to CSV files")]
    fn amz_export_csv(&self, params: Parameters<ExportCsvParams>) -> Result<CallToolResult, McpError> {
        self.run_tool("export_csv", params.0)
    }

    #[tool(description = "Count the product sessions, reviews and product records currently stored")]
    fn amz_store_stats(&self) -> Result<CallToolResult, McpError> {
        let state = self
            .state
            .lock()
            .map_err(|_| McpError::internal_error("Server state is poisoned", None))?;

        convert_result(InternalToolResult::success_with(serde_json::json!(state.store.stats())))
    }
}
