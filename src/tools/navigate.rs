use crate::{error::Result,
            pagination::{product_page_url, resolve_asin, review_page_url},
            tools::{Tool, ToolContext, ToolResult, utils::normalize_url}};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Parameters for the navigate tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavigateParams {
    /// Amazon product or review page URL
    pub url: String,

    /// Open the product's review listing at this page instead of the URL itself
    #[serde(default)]
    pub review_page: Option<u32>,

    /// Open the canonical product page for the URL's ASIN (ignored with review_page)
    #[serde(default)]
    pub canonical: bool,

    /// Wait for navigation to complete (default: true)
    #[serde(default = "default_wait")]
    pub wait_for_load: bool,
}

fn default_wait() -> bool {
    true
}

/// Open an Amazon product or review page in the active tab.
///
/// URLs without a product ASIN are refused before the browser is touched.
#[derive(Default)]
pub struct NavigateTool;

impl NavigateTool {
    /// Where `params` lead on the marketplace at `origin`, with the ASIN they name
    pub fn target(params: &NavigateParams, origin: &str) -> Result<(String, String)> {
        let url = normalize_url(&params.url);
        let asin = resolve_asin(&url)?;

        let target = match params.review_page {
            Some(page) => review_page_url(origin, &asin, page),
            None if params.canonical => product_page_url(origin, &asin),
            None => url,
        };
        Ok((asin, target))
    }
}

impl Tool for NavigateTool {
    type Params = NavigateParams;

    fn name(&self) -> &str {
        "navigate"
    }

    fn description(&self) -> &str {
        "Open an Amazon product page, or one of its review pages, in the browser's active tab"
    }

    fn execute_typed(&self, params: NavigateParams, context: &mut ToolContext) -> Result<ToolResult> {
        let (asin, target) = match Self::target(&params, &context.config.origin) {
            Ok(found) => found,
            Err(e) => return Ok(ToolResult::failure(e.to_string())),
        };

        let session = context.session()?;
        log::info!("Opening {} for {}", target, asin);
        session.navigate(&target)?;

        if params.wait_for_load {
            session.wait_for_navigation()?;
        }

        Ok(ToolResult::success_with(json!({
            "asin": asin,
            "requested_url": params.url,
            "url": target,
            "review_page": params.review_page,
            "waited": params.wait_for_load
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pagination::DEFAULT_ORIGIN, store::ScrapeStore};

    fn params(value: serde_json::Value) -> NavigateParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_navigate_params_default() {
        let params = params(json!({"url": "https://www.amazon.com/dp/B0ABCDEF12"}));
        assert!(params.wait_for_load);
        assert!(!params.canonical);
        assert!(params.review_page.is_none());
    }

    #[test]
    fn test_target_keeps_product_url() {
        let params = params(json!({"url": "www.amazon.com/Acme-Mug/dp/B0ABCDEF12?th=1"}));
        let (asin, target) = NavigateTool::target(&params, DEFAULT_ORIGIN).unwrap();
        assert_eq!(asin, "B0ABCDEF12");
        assert_eq!(target, "https://www.amazon.com/Acme-Mug/dp/B0ABCDEF12?th=1");
    }

    #[test]
    fn test_target_canonical_and_review_page() {
        let canonical = params(json!({"url": "https://www.amazon.de/gp/product/B0ABCDEF12", "canonical": true}));
        assert_eq!(
            NavigateTool::target(&canonical, "https://www.amazon.de").unwrap().1,
            "https://www.amazon.de/dp/B0ABCDEF12"
        );

        let reviews = params(json!({"url": "https://www.amazon.com/dp/B0ABCDEF12", "review_page": 3}));
        assert_eq!(
            NavigateTool::target(&reviews, DEFAULT_ORIGIN).unwrap().1,
            review_page_url(DEFAULT_ORIGIN, "B0ABCDEF12", 3)
        );
    }

    #[test]
    fn test_non_amazon_url_refused_without_browser() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ScrapeStore::open(dir.path().join("store.json")).unwrap();
        let mut context = ToolContext::offline(&mut store);

        let result = NavigateTool
            .execute(json!({"url": "https://example.com/dp/B0ABCDEF12"}), &mut context)
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not an Amazon page"));

        // a valid target still needs a browser
        assert!(
            NavigateTool
                .execute(json!({"url": "https://www.amazon.com/dp/B0ABCDEF12"}), &mut context)
                .is_err()
        );
    }

    #[test]
    fn test_navigate_tool_metadata() {
        let tool = NavigateTool;
        assert_eq!(tool.name(), "navigate");
        assert!(tool.parameters_schema()["properties"]["review_page"].is_object());
    }
}
