//! Page capability interface used by the pagination controller
//!
//! A [`PageAgent`] owns one page: it can report where it is, hand out the
//! current document, trigger in-page navigation and wait for the page to
//! reach a state. The controller never touches the browser directly, so the
//! same algorithm runs against a live tab ([`ChromeAgent`]) or a stored set of
//! pages ([`ReplayAgent`]).

pub mod chrome;
pub mod replay;

pub use chrome::ChromeAgent;
pub use replay::ReplayAgent;

use crate::{error::Result,
            extract::{NavigationMethod, PageProbe, reviews::probe_page}};
use scraper::Html;
use std::time::Duration;

/// Condition evaluated against successive probes while waiting for navigation
pub type ProbeCondition<'a> = &'a dyn Fn(&PageProbe) -> bool;

pub trait PageAgent {
    /// URL of the document currently loaded
    fn current_url(&self) -> Result<String>;

    /// Load `url` and wait for the load to finish
    fn navigate_to(&mut self, url: &str) -> Result<()>;

    /// Serialized HTML of the current document
    fn page_source(&self) -> Result<String>;

    /// Parsed current document
    fn document(&self) -> Result<Html> {
        Ok(Html::parse_document(&self.page_source()?))
    }

    /// Run an extractor over the current document
    fn query_fields<T, F>(&self, extract: F) -> Result<T>
    where
        F: FnOnce(&Html) -> T,
        Self: Sized,
    {
        let document = self.document()?;
        Ok(extract(&document))
    }

    /// Pagination state of the current document
    fn probe(&self) -> Result<PageProbe> {
        Ok(probe_page(&self.document()?))
    }

    /// Advance toward `target_page` using the first mechanism available.
    /// Returns the mechanism used, or `None` when the page offers none.
    fn trigger_navigation(&mut self, target_page: u32) -> Result<Option<NavigationMethod>>;

    /// Block until `condition` holds or `timeout` elapses; `poll` is the probing cadence.
    /// Returns whether the condition was observed.
    fn wait_for_change(&mut self, condition: ProbeCondition<'_>, timeout: Duration, poll: Duration) -> Result<bool>;

    /// Let the page settle after navigation before it is scraped
    fn settle(&mut self, delay: Duration);

    /// Open collapsed product-detail sections so their content is in the document
    fn expand_sections(&mut self) -> Result<()> {
        Ok(())
    }
}
