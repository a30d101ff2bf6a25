//! # amz-scraper
//!
//! Amazon product and review scraping over the Chrome DevTools Protocol (CDP),
//! with CSV export and a Model Context Protocol (MCP) server.
//!
//! ## Features
//!
//! - **Review pagination**: walks every review page of a product, deduplicating
//!   reviews by id and stopping on a page budget, a missing next control or an empty page
//! - **Product extraction**: title, price, rating, images, specifications,
//!   variations and more from a product detail page
//! - **CSV export**: fixed-column review and product files
//! - **Offline replay**: the same algorithms over saved HTML pages
//! - **MCP Server**: the scraping tools exposed to AI agents
//!
//! ## Running
//!
//! ```bash
//! # Scrape the reviews of a product, then export
//! cargo run --bin amz-scraper -- reviews https://www.amazon.com/dp/B0ABCDEF12
//! cargo run --bin amz-scraper -- export -o ./csv
//!
//! # MCP server over stdio
//! cargo run --features mcp-server --bin mcp-server
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use amz_scraper::{BrowserSession, ChromeAgent, LaunchOptions, ScrapeConfig, scrape_reviews};
//!
//! # fn main() -> amz_scraper::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let mut agent = ChromeAgent::new(&session);
//!
//! let report = scrape_reviews(&mut agent, "https://www.amazon.com/dp/B0ABCDEF12", &ScrapeConfig::default())?;
//! println!("{} reviews ({})", report.review_count(), report.termination);
//! # Ok(())
//! # }
//! ```
//!
//! Saved pages replay without a browser:
//!
//! ```rust,no_run
//! use amz_scraper::{ReplayAgent, ScrapeConfig, scrape_reviews};
//!
//! # fn main() -> amz_scraper::Result<()> {
//! let mut agent = ReplayAgent::from_dir("./saved-pages", "B0ABCDEF12")?;
//! let report = scrape_reviews(&mut agent, "https://www.amazon.com/dp/B0ABCDEF12", &ScrapeConfig::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: browser session management and configuration
//! - [`agent`]: the page capability the scrapers run against (live tab or replay)
//! - [`extract`]: field extraction from product and review pages
//! - [`pagination`]: the multi-page review controller and scrape settings
//! - [`models`]: product, review and session records
//! - [`export`]: CSV serialization
//! - [`store`]: JSON file holding results until export
//! - [`tools`]: command surface shared by the CLI and MCP server
//! - [`mcp`]: Model Context Protocol server (requires `mcp-handler` feature)

pub mod agent;
pub mod browser;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod pagination;
pub mod store;
pub mod tools;

#[cfg(feature = "mcp-handler")]
pub mod mcp;

pub use agent::{ChromeAgent, PageAgent, ReplayAgent};
pub use browser::{BrowserSession, ConnectionOptions, LaunchOptions};
pub use error::{Result, ScrapeError};
pub use export::{ProductCsvOptions, products_csv, reviews_csv};
pub use extract::{ProductExtractor, SpecClassifier};
pub use models::{ProductRecord, ReviewRecord, ScrapeSession, SessionEntry};
pub use pagination::{PageBudget, PaginationController, RunReport, ScrapeConfig, Termination, scrape_product,
                     scrape_reviews};
pub use store::ScrapeStore;
pub use tools::{Tool, ToolContext, ToolRegistry, ToolResult};

#[cfg(feature = "mcp-handler")]
pub use mcp::ScraperServer;
#[cfg(feature = "mcp-handler")]
pub use rmcp::ServiceExt;
