use crate::{agent::ChromeAgent,
            error::Result,
            pagination::scrape_product,
            tools::{Tool, ToolContext, ToolResult, utils::optional_url}};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Parameters for the extract_product tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractProductParams {
    /// Product page URL (default: the page currently open)
    #[serde(default)]
    pub url: Option<String>,

    /// Keep the record in the result store (default: true)
    #[serde(default = "default_save")]
    pub save: bool,
}

fn default_save() -> bool {
    true
}

/// Extract the detail record of a product page
#[derive(Default)]
pub struct ExtractProductTool;

impl Tool for ExtractProductTool {
    type Params = ExtractProductParams;

    fn name(&self) -> &str {
        "extract_product"
    }

    fn description(&self) -> &str {
        "Extract title, price, images, specifications and variations from an Amazon product page"
    }

    fn execute_typed(&self, params: ExtractProductParams, context: &mut ToolContext) -> Result<ToolResult> {
        let mut agent = ChromeAgent::new(context.session()?);
        let url = optional_url(params.url.as_deref());

        let product = scrape_product(&mut agent, url.as_deref(), &context.config)?;
        let data = serde_json::to_value(&product)?;

        if params.save {
            context.store.add_product(product);
            context.store.save()?;
        }

        Ok(ToolResult::success_with(json!({
            "product": data,
            "saved": params.save,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults() {
        let params: ExtractProductParams = serde_json::from_value(json!({"url": "amazon.com/dp/B0ABCDEF12"})).unwrap();
        assert_eq!(params.url.as_deref(), Some("amazon.com/dp/B0ABCDEF12"));
        assert!(params.save);
    }

    #[test]
    fn test_tool_metadata() {
        assert_eq!(ExtractProductTool.name(), "extract_product");
        assert!(ExtractProductTool.parameters_schema().is_object());
    }
}
