use amz_scraper::{BrowserSession, ChromeAgent, LaunchOptions, PageAgent, ScrapeStore, ToolContext, ToolRegistry,
                  extract::{ProductExtractor, reviews::scrape_review_page}};
use serde_json::json;

const REVIEW_PAGE: &str = r#"<html><body>
    <div id="cm_cr_dp_d_product_info"><h1><a>Acme Mug</a></h1></div>
    <div id="R1" data-hook="review"><span class="a-profile-name">Jane</span>
        <span data-hook="review-body"><span>Great</span></span></div>
    <div id="R2" data-hook="review"><span class="a-profile-name">Sam</span></div>
    <ul class="a-pagination"><li class="a-selected"><a>1</a></li><li class="a-last a-disabled">Next</li></ul>
</body></html>"#;

fn data_url(html: &str) -> String {
    format!("data:text/html,{}", urlencoding::encode(html))
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_review_page_from_live_tab() {
    let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
    let mut agent = ChromeAgent::new(&session);
    agent.navigate_to(&data_url(REVIEW_PAGE)).expect("Failed to navigate");

    let probe = agent.probe().expect("Probe failed");
    assert_eq!(probe.page_indicator, Some(1));
    assert_eq!(probe.review_count, 2);
    assert!(!probe.has_next);

    let page = agent
        .query_fields(|document| scrape_review_page(document, 1, "https://www.amazon.com/"))
        .expect("Failed to read page");
    assert_eq!(page.product_name, "Acme Mug");
    assert_eq!(page.reviews.len(), 2);
    assert_eq!(page.reviews[0].author, "Jane");
}

#[test]
#[ignore]
fn test_expand_sections_then_extract() {
    let html = r#"<html><body><span id="productTitle">Acme Mug</span>
        <div id="prodDetails"><div class="a-expander-container">
            <a class="a-expander-header">Item details</a>
            <div class="a-expander-content"><table><tr><th>Brand</th><td>Acme</td></tr></table></div>
        </div></div></body></html>"#;

    let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
    let mut agent = ChromeAgent::new(&session);
    agent.navigate_to(&data_url(html)).expect("Failed to navigate");
    agent.expand_sections().expect("Failed to expand sections");

    let product = agent
        .query_fields(|document| {
            ProductExtractor::default().extract(document, "B0ABCDEF12", "https://www.amazon.com/dp/B0ABCDEF12")
        })
        .expect("Failed to read page");
    assert_eq!(product.title.as_deref(), Some("Acme Mug"));
}

#[test]
#[ignore] // Also needs network access
fn test_navigate_tool_opens_review_listing() {
    let dir = tempfile::tempdir().unwrap();
    let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
    let mut store = ScrapeStore::open(dir.path().join("store.json")).unwrap();
    let mut context = ToolContext::new(&session, &mut store);

    let registry = ToolRegistry::with_defaults();
    let refused = registry
        .execute("navigate", json!({"url": data_url(REVIEW_PAGE)}), &mut context)
        .expect("Navigate failed");
    assert!(!refused.success);
    assert!(session.current_url().map_or(true, |url| !url.starts_with("data:")));

    let result = registry
        .execute(
            "navigate",
            json!({"url": "https://www.amazon.com/dp/B0ABCDEF12", "review_page": 2}),
            &mut context,
        )
        .expect("Navigate failed");
    assert!(result.success);
    assert_eq!(result.data.unwrap()["asin"], "B0ABCDEF12");

    session.close().expect("Failed to close tabs");
    // closing again only logs the tabs that are already gone
    session.close().expect("Second close failed");
}
