//! Multi-page review scraping
//!
//! [`PaginationController`] walks the review-listing pages of one product
//! through a [`PageAgent`]:
//!
//! ```text
//! AwaitingPage1 -> ScrapingPage(1) -> Navigating(1 -> 2) -> ScrapingPage(2) -> ... -> Done
//! ```
//!
//! A run ends successfully when the page budget is spent, the page has no
//! enabled next control, or a page yields no reviews. It ends as a partial
//! failure when no navigation mechanism applies or the page never changes
//! within the navigation timeout; either way the reviews collected so far are
//! kept. Only page-fetch and script errors abort with `Err`.

use crate::{agent::PageAgent,
            error::{Result, ScrapeError},
            extract::{PageProbe, ProductExtractor, SpecClassifier, scrape_review_page},
            models::{ProductRecord, ScrapeSession, SpecBucket}};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt,
          sync::LazyLock,
          time::Duration};

/// Marketplace the canonical URLs point at unless configured otherwise
pub const DEFAULT_ORIGIN: &str = "https://www.amazon.com";

static ASIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/dp/([A-Z0-9]{10})",
        r"(?i)/product-reviews/([A-Z0-9]{10})",
        r"(?i)/gp/product/([A-Z0-9]{10})",
        r"(?i)/([A-Z0-9]{10})(?:/|\?|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Product identifier found in a product or review URL
pub fn resolve_asin(url: &str) -> Result<String> {
    if !url.to_lowercase().contains("amazon.") {
        return Err(ScrapeError::InvalidAsin(format!("{} (not an Amazon page)", url)));
    }

    ASIN_PATTERNS
        .iter()
        .find_map(|p| p.captures(url).map(|c| c[1].to_uppercase()))
        .ok_or_else(|| ScrapeError::InvalidAsin(url.to_string()))
}

/// Canonical product detail URL
pub fn product_page_url(origin: &str, asin: &str) -> String {
    format!("{}/dp/{}", origin, asin)
}

/// Canonical review-listing URL for `page` (1-based)
pub fn review_page_url(origin: &str, asin: &str, page: u32) -> String {
    if page <= 1 {
        format!(
            "{}/product-reviews/{}/ref=cm_cr_dp_d_show_all_btm?ie=UTF8&reviewerType=all_reviews",
            origin, asin
        )
    } else {
        format!(
            "{}/product-reviews/{}/ref=cm_cr_arp_d_paging_btm_next_{}?ie=UTF8&reviewerType=all_reviews&pageNumber={}",
            origin, asin, page, page
        )
    }
}

/// How many review pages a run may scrape
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageBudget {
    /// Keep going while a next page exists
    #[default]
    All,
    /// Stop after this many pages
    Limit(u32),
}

impl PageBudget {
    /// `None` or `0` mean every available page
    pub fn from_max_pages(max_pages: Option<u32>) -> Self {
        match max_pages {
            Some(n) if n > 0 => PageBudget::Limit(n),
            _ => PageBudget::All,
        }
    }

    pub fn is_exhausted(&self, pages_scraped: u32) -> bool {
        match self {
            PageBudget::All => false,
            PageBudget::Limit(n) => pages_scraped >= *n,
        }
    }
}

fn default_poll_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_settle_ms() -> u64 {
    2_000
}

fn default_initial_load_ms() -> u64 {
    3_000
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

/// Settings for review and product scraping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub budget: PageBudget,

    /// Probe cadence while waiting for a page to change
    #[serde(default = "default_poll_ms")]
    pub poll_interval_ms: u64,

    /// How long a triggered navigation may take before the run gives up
    #[serde(default = "default_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Pause after a page change is observed, before scraping it
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Pause after forcing navigation to page 1
    #[serde(default = "default_initial_load_ms")]
    pub initial_load_ms: u64,

    #[serde(default = "default_origin")]
    pub origin: String,

    /// Bucket for specification pairs no rule claims
    #[serde(default)]
    pub spec_fallback: SpecBucket,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            budget: PageBudget::All,
            poll_interval_ms: default_poll_ms(),
            navigation_timeout_ms: default_timeout_ms(),
            settle_ms: default_settle_ms(),
            initial_load_ms: default_initial_load_ms(),
            origin: default_origin(),
            spec_fallback: SpecBucket::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set page budget
    pub fn budget(mut self, budget: PageBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Builder method: set navigation timeout
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set settle delay
    pub fn settle(mut self, delay: Duration) -> Self {
        self.settle_ms = delay.as_millis() as u64;
        self
    }

    /// Builder method: set marketplace origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Builder method: set spec fallback bucket
    pub fn spec_fallback(mut self, bucket: SpecBucket) -> Self {
        self.spec_fallback = bucket;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn navigation_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn initial_load_duration(&self) -> Duration {
        Duration::from_millis(self.initial_load_ms)
    }
}

/// Why a run finished normally
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BudgetReached,
    NoNextPage,
    EmptyPage,
}

/// Why a run finished early with partial results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NavigationFailure {
    /// The page offered no next button, page link or pagination form
    NoMechanism { target: u32 },
    /// Navigation was triggered but the page never changed
    Timeout { target: u32 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Success(StopReason),
    Failure(NavigationFailure),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Success(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Success(StopReason::BudgetReached) => write!(f, "page budget reached"),
            Termination::Success(StopReason::NoNextPage) => write!(f, "no further pages"),
            Termination::Success(StopReason::EmptyPage) => write!(f, "page had no reviews"),
            Termination::Failure(NavigationFailure::NoMechanism { target }) => {
                write!(f, "no way to reach page {}, partial results kept", target)
            }
            Termination::Failure(NavigationFailure::Timeout { target }) => {
                write!(f, "page {} never loaded, partial results kept", target)
            }
        }
    }
}

/// Controller states, recorded in order as the run moves through them
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    AwaitingPage1,
    ScrapingPage(u32),
    Navigating { from: u32, to: u32 },
    Done(Termination),
}

/// Outcome of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub session: ScrapeSession,
    pub termination: Termination,
    /// Review pages actually scraped
    pub pages_visited: u32,
    pub history: Vec<RunState>,
}

impl RunReport {
    pub fn review_count(&self) -> usize {
        self.session.reviews().len()
    }
}

/// Drives one pagination run; the session it is given is owned for the duration
pub struct PaginationController<'a, A: PageAgent> {
    agent: &'a mut A,
    config: &'a ScrapeConfig,
    history: Vec<RunState>,
}

impl<'a, A: PageAgent> PaginationController<'a, A> {
    pub fn new(agent: &'a mut A, config: &'a ScrapeConfig) -> Self {
        Self {
            agent,
            config,
            history: Vec::new(),
        }
    }

    fn enter(&mut self, state: RunState) {
        log::debug!("Pagination state: {:?}", state);
        self.history.push(state);
    }

    /// Move to page 1 unless the agent is already showing it
    fn ensure_page_one(&mut self, session: &ScrapeSession) -> Result<()> {
        let url = self.agent.current_url()?;

        let on_page_one = url.contains("/product-reviews/")
            && self.agent.probe()?.page_indicator.is_none_or(|shown| shown == 1);

        if !on_page_one {
            log::info!("Opening first review page for {}", session.asin);
            self.agent.navigate_to(&session.reviews_url)?;
            self.agent.settle(self.config.initial_load_duration());
        }

        Ok(())
    }

    pub fn run(mut self, mut session: ScrapeSession) -> Result<RunReport> {
        self.enter(RunState::AwaitingPage1);
        self.ensure_page_one(&session)?;

        let mut page = 1;
        let mut pages_visited = 0;

        let termination = loop {
            self.enter(RunState::ScrapingPage(page));

            let base_url = self.agent.current_url()?;
            let scraped = self
                .agent
                .query_fields(|document| scrape_review_page(document, page, &base_url))?;

            if page == 1 {
                session.product_name = scraped.product_name.clone();
            }

            if scraped.reviews.is_empty() {
                log::info!("No reviews on page {}, stopping", page);
                break Termination::Success(StopReason::EmptyPage);
            }

            pages_visited += 1;
            let found = scraped.reviews.len();
            let added = session.record_page(scraped.page, scraped.reviews);
            log::info!(
                "Page {}: {} reviews, {} new ({} total)",
                page,
                found,
                added,
                session.reviews().len()
            );

            if self.config.budget.is_exhausted(pages_visited) {
                break Termination::Success(StopReason::BudgetReached);
            }
            if !scraped.probe.has_next {
                break Termination::Success(StopReason::NoNextPage);
            }

            let target = page + 1;
            self.enter(RunState::Navigating { from: page, to: target });

            let Some(method) = self.agent.trigger_navigation(target)? else {
                log::warn!("No pagination control leads to page {}", target);
                break Termination::Failure(NavigationFailure::NoMechanism { target });
            };
            log::debug!("Navigating to page {} via {:?}", target, method);

            let previous_first = scraped.probe.first_review_id;
            let arrived = self.agent.wait_for_change(
                &|probe: &PageProbe| {
                    probe.page_indicator == Some(target)
                        || (probe.first_review_id.is_some() && probe.first_review_id != previous_first)
                },
                self.config.navigation_timeout_duration(),
                self.config.poll_interval(),
            )?;

            if !arrived {
                log::warn!(
                    "Page {} did not load within {} ms",
                    target,
                    self.config.navigation_timeout_ms
                );
                break Termination::Failure(NavigationFailure::Timeout { target });
            }

            self.agent.settle(self.config.settle_duration());
            page = target;
        };

        self.enter(RunState::Done(termination));
        log::info!(
            "Finished {} after {} pages: {} reviews ({})",
            session.asin,
            pages_visited,
            session.reviews().len(),
            termination
        );

        Ok(RunReport {
            session,
            termination,
            pages_visited,
            history: self.history,
        })
    }
}

/// Scrape every review page reachable from `url` (a product or review page URL)
pub fn scrape_reviews<A: PageAgent>(agent: &mut A, url: &str, config: &ScrapeConfig) -> Result<RunReport> {
    let asin = resolve_asin(url)?;
    let reviews_url = review_page_url(&config.origin, &asin, 1);
    let session = ScrapeSession::new(asin, url, reviews_url);

    PaginationController::new(agent, config).run(session)
}

/// Extract the product detail record from `url`, or from the page the agent is on
pub fn scrape_product<A: PageAgent>(agent: &mut A, url: Option<&str>, config: &ScrapeConfig) -> Result<ProductRecord> {
    if let Some(url) = url {
        agent.navigate_to(url)?;
    }

    let product_url = match url {
        Some(url) => url.to_string(),
        None => agent.current_url()?,
    };
    let asin = resolve_asin(&product_url)?;

    agent.expand_sections()?;

    let extractor = ProductExtractor::new(config.origin.clone(), SpecClassifier::with_fallback(config.spec_fallback));
    let product = agent.query_fields(|document| extractor.extract(document, &asin, &product_url))?;

    log::info!("Extracted product {} from {}", asin, product_url);
    Ok(product)
}
