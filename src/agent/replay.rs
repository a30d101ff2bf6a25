use crate::{agent::{PageAgent, ProbeCondition},
            error::{Result, ScrapeError},
            extract::{NavigationMethod, reviews::navigation_method},
            pagination::{DEFAULT_ORIGIN, product_page_url, review_page_url}};
use regex::Regex;
use std::{collections::BTreeMap,
          fs,
          path::Path,
          sync::LazyLock,
          time::Duration};
use url::Url;

const EMPTY_DOCUMENT: &str = "<html><head></head><body></body></html>";

static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Blank,
    Product,
    Reviews(u32),
    Other(String),
}

/// [`PageAgent`] over stored HTML pages for one product.
///
/// Review-listing page `n` is served for the canonical review URLs. In-page
/// navigation takes effect immediately when the target page is stored; when it
/// is not, the document stays unchanged, which is how a page that never
/// advances looks to the controller. Waiting checks the condition once and
/// settling does nothing.
#[derive(Debug, Clone)]
pub struct ReplayAgent {
    origin: String,
    asin: String,
    product_page: Option<String>,
    review_pages: BTreeMap<u32, String>,
    location: Location,
    visited: Vec<String>,
}

impl ReplayAgent {
    pub fn new(asin: impl Into<String>) -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            asin: asin.into(),
            product_page: None,
            review_pages: BTreeMap::new(),
            location: Location::Blank,
            visited: Vec::new(),
        }
    }

    /// Builder method: marketplace origin used for generated URLs
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Builder method: product detail page
    pub fn product_page(mut self, html: impl Into<String>) -> Self {
        self.product_page = Some(html.into());
        self
    }

    /// Builder method: review-listing page `page`
    pub fn review_page(mut self, page: u32, html: impl Into<String>) -> Self {
        self.review_pages.insert(page, html.into());
        self
    }

    /// Builder method: start on `url` instead of a blank page
    pub fn starting_at(mut self, url: &str) -> Self {
        self.location = self.locate(url);
        self
    }

    /// Load pages saved in `dir`: `product.html`, plus one file per review page
    /// whose stem ends in the page number (`page-1.html`, `reviews_2.html`, ...).
    pub fn from_dir(dir: impl AsRef<Path>, asin: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut agent = Self::new(asin);

        let entries = fs::read_dir(dir)
            .map_err(|e| ScrapeError::PageFetchFailed(format!("Cannot read {}: {}", dir.display(), e)))?;

        for entry in entries {
            let path = entry?.path();
            let is_html = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
            if !is_html {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            if stem.eq_ignore_ascii_case("product") {
                agent.product_page = Some(fs::read_to_string(&path)?);
            } else if let Some(page) = TRAILING_NUMBER.captures(stem).and_then(|c| c[1].parse().ok()) {
                agent.review_pages.insert(page, fs::read_to_string(&path)?);
            } else {
                log::debug!("Ignoring {}", path.display());
            }
        }

        log::info!(
            "Loaded {} review pages from {}{}",
            agent.review_pages.len(),
            dir.display(),
            if agent.product_page.is_some() { " (with product page)" } else { "" }
        );

        Ok(agent)
    }

    pub fn review_page_count(&self) -> usize {
        self.review_pages.len()
    }

    pub fn has_product_page(&self) -> bool {
        self.product_page.is_some()
    }

    /// URLs passed to [`PageAgent::navigate_to`], in order
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    fn locate(&self, url: &str) -> Location {
        if url.contains("/product-reviews/") {
            let page = Url::parse(url)
                .ok()
                .and_then(|u| {
                    u.query_pairs()
                        .find(|(key, _)| key == "pageNumber")
                        .and_then(|(_, value)| value.parse().ok())
                })
                .unwrap_or(1);
            Location::Reviews(page)
        } else if url.contains("/dp/") || url.contains("/gp/product/") {
            Location::Product
        } else if url == "about:blank" {
            Location::Blank
        } else {
            Location::Other(url.to_string())
        }
    }
}

impl PageAgent for ReplayAgent {
    fn current_url(&self) -> Result<String> {
        Ok(match &self.location {
            Location::Blank => "about:blank".to_string(),
            Location::Product => product_page_url(&self.origin, &self.asin),
            Location::Reviews(page) => review_page_url(&self.origin, &self.asin, *page),
            Location::Other(url) => url.clone(),
        })
    }

    fn navigate_to(&mut self, url: &str) -> Result<()> {
        self.visited.push(url.to_string());
        self.location = self.locate(url);
        Ok(())
    }

    fn page_source(&self) -> Result<String> {
        let html = match &self.location {
            Location::Product => self.product_page.as_deref(),
            Location::Reviews(page) => self.review_pages.get(page).map(String::as_str),
            Location::Blank | Location::Other(_) => None,
        };
        Ok(html.unwrap_or(EMPTY_DOCUMENT).to_string())
    }

    fn trigger_navigation(&mut self, target_page: u32) -> Result<Option<NavigationMethod>> {
        let method = navigation_method(&self.document()?, target_page);

        if method.is_some() {
            if self.review_pages.contains_key(&target_page) {
                self.location = Location::Reviews(target_page);
            } else {
                log::debug!("No stored page {}, staying put", target_page);
            }
        }

        Ok(method)
    }

    fn wait_for_change(&mut self, condition: ProbeCondition<'_>, _timeout: Duration, _poll: Duration) -> Result<bool> {
        Ok(condition(&self.probe()?))
    }

    fn settle(&mut self, _delay: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PageProbe;

    const PAGE_ONE: &str = r#"<ul class="a-pagination"><li class="a-selected"><a>1</a></li>
        <li class="a-last"><a>Next</a></li></ul><div id="R1" data-hook="review"></div>"#;
    const PAGE_TWO: &str = r#"<ul class="a-pagination"><li class="a-selected"><a>2</a></li>
        <li class="a-last a-disabled">Next</li></ul><div id="R2" data-hook="review"></div>"#;

    #[test]
    fn test_navigate_to_canonical_urls() {
        let mut agent = ReplayAgent::new("B000TEST01")
            .review_page(1, PAGE_ONE)
            .review_page(2, PAGE_TWO);

        agent.navigate_to(&review_page_url(DEFAULT_ORIGIN, "B000TEST01", 2)).unwrap();
        assert_eq!(agent.probe().unwrap().page_indicator, Some(2));
        assert_eq!(agent.current_url().unwrap(), review_page_url(DEFAULT_ORIGIN, "B000TEST01", 2));

        agent.navigate_to(&review_page_url(DEFAULT_ORIGIN, "B000TEST01", 1)).unwrap();
        assert_eq!(agent.probe().unwrap().first_review_id.as_deref(), Some("R1"));
        assert_eq!(agent.visited().len(), 2);
    }

    #[test]
    fn test_trigger_navigation_moves_to_stored_page() {
        let mut agent = ReplayAgent::new("B000TEST01")
            .review_page(1, PAGE_ONE)
            .review_page(2, PAGE_TWO)
            .starting_at(&review_page_url(DEFAULT_ORIGIN, "B000TEST01", 1));

        assert_eq!(agent.trigger_navigation(2).unwrap(), Some(NavigationMethod::NextButton));
        let arrived = agent
            .wait_for_change(&|p: &PageProbe| p.page_indicator == Some(2), Duration::ZERO, Duration::ZERO)
            .unwrap();
        assert!(arrived);

        // page 2 has a disabled next control and no links
        assert_eq!(agent.trigger_navigation(3).unwrap(), None);
    }

    #[test]
    fn test_missing_target_page_stays_put() {
        let mut agent = ReplayAgent::new("B000TEST01")
            .review_page(1, PAGE_ONE)
            .starting_at(&review_page_url(DEFAULT_ORIGIN, "B000TEST01", 1));

        assert_eq!(agent.trigger_navigation(2).unwrap(), Some(NavigationMethod::NextButton));
        let arrived = agent
            .wait_for_change(&|p: &PageProbe| p.page_indicator == Some(2), Duration::ZERO, Duration::ZERO)
            .unwrap();
        assert!(!arrived);
    }

    #[test]
    fn test_unknown_location_serves_empty_document() {
        let agent = ReplayAgent::new("B000TEST01").starting_at("https://example.com/");
        assert_eq!(agent.page_source().unwrap(), EMPTY_DOCUMENT);
        assert_eq!(agent.current_url().unwrap(), "https://example.com/");
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("product.html"), "<span id=\"productTitle\">Mug</span>").unwrap();
        fs::write(dir.path().join("page-1.html"), PAGE_ONE).unwrap();
        fs::write(dir.path().join("page-2.html"), PAGE_TWO).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut agent = ReplayAgent::from_dir(dir.path(), "B000TEST01").unwrap();
        assert_eq!(agent.review_page_count(), 2);
        assert!(agent.has_product_page());

        agent.navigate_to(&product_page_url(DEFAULT_ORIGIN, "B000TEST01")).unwrap();
        assert!(agent.page_source().unwrap().contains("productTitle"));
    }
}
