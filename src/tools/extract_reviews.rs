use crate::{agent::{ChromeAgent, PageAgent},
            error::Result,
            pagination::{PageBudget, RunReport, scrape_reviews},
            tools::{Tool, ToolContext, ToolResult, utils::optional_url}};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Parameters for the extract_reviews tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractReviewsParams {
    /// Product or review page URL (default: the page currently open)
    #[serde(default)]
    pub url: Option<String>,

    /// Stop after this many review pages; 0 or absent scrapes all of them
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Keep the run in the result store (default: true)
    #[serde(default = "default_save")]
    pub save: bool,
}

fn default_save() -> bool {
    true
}

/// Summary returned to the caller; the reviews themselves go to the store
pub fn report_summary(report: &RunReport, key: Option<&str>) -> Value {
    json!({
        "asin": report.session.asin,
        "product_name": report.session.product_name,
        "reviews": report.review_count(),
        "pages_visited": report.pages_visited,
        "complete": report.termination.is_success(),
        "termination": report.termination.to_string(),
        "stored_as": key,
    })
}

/// Scrape every review page of a product
#[derive(Default)]
pub struct ExtractReviewsTool;

impl Tool for ExtractReviewsTool {
    type Params = ExtractReviewsParams;

    fn name(&self) -> &str {
        "extract_reviews"
    }

    fn description(&self) -> &str {
        "Scrape the reviews of an Amazon product across all review pages and store them"
    }

    fn execute_typed(&self, params: ExtractReviewsParams, context: &mut ToolContext) -> Result<ToolResult> {
        let mut agent = ChromeAgent::new(context.session()?);

        let url = match optional_url(params.url.as_deref()) {
            Some(url) => url,
            None => agent.current_url()?,
        };

        let config = context
            .config
            .clone()
            .budget(PageBudget::from_max_pages(params.max_pages));

        let report = scrape_reviews(&mut agent, &url, &config)?;

        let key = if params.save && report.review_count() > 0 {
            let entry = report.session.clone().into_entry();
            let key = context.store.add_session(entry);
            context.store.save()?;
            Some(key)
        } else {
            None
        };

        Ok(ToolResult::success_with(report_summary(&report, key.as_deref())))
    }
}
