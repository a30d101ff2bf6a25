use crate::{agent::{PageAgent, ProbeCondition},
            browser::BrowserSession,
            error::{Result, ScrapeError},
            extract::{NavigationMethod, PageProbe}};
use std::{thread,
          time::{Duration, Instant}};

const PROBE_JS: &str = include_str!("probe_page.js");
const TRIGGER_JS: &str = include_str!("trigger_navigation.js");
const EXPAND_JS: &str = include_str!("expand_sections.js");

/// [`PageAgent`] backed by the active tab of a live browser session
pub struct ChromeAgent<'a> {
    session: &'a BrowserSession,
}

impl<'a> ChromeAgent<'a> {
    pub fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &BrowserSession {
        self.session
    }

    /// Evaluate a script that returns a JSON string and decode it
    fn evaluate_json<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let value = self
            .session
            .evaluate(script)?
            .ok_or_else(|| ScrapeError::EvaluationFailed("Script returned no value".to_string()))?;

        let json: String = serde_json::from_value(value)
            .map_err(|e| ScrapeError::EvaluationFailed(format!("Expected a JSON string: {}", e)))?;

        serde_json::from_str(&json).map_err(|e| ScrapeError::EvaluationFailed(format!("Malformed probe result: {}", e)))
    }
}

impl PageAgent for ChromeAgent<'_> {
    fn current_url(&self) -> Result<String> {
        self.session.current_url()
    }

    fn navigate_to(&mut self, url: &str) -> Result<()> {
        log::debug!("Navigating to {}", url);
        self.session.navigate(url)?;
        self.session.wait_for_navigation()
    }

    fn page_source(&self) -> Result<String> {
        self.session.page_source()
    }

    fn probe(&self) -> Result<PageProbe> {
        self.evaluate_json(PROBE_JS)
    }

    fn trigger_navigation(&mut self, target_page: u32) -> Result<Option<NavigationMethod>> {
        let script = format!("({})({})", TRIGGER_JS.trim(), target_page);

        match self.session.evaluate(&script)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ScrapeError::EvaluationFailed(format!("Unknown navigation method: {}", e))),
            None => Ok(None),
        }
    }

    fn wait_for_change(&mut self, condition: ProbeCondition<'_>, timeout: Duration, poll: Duration) -> Result<bool> {
        let started = Instant::now();

        loop {
            // The document is replaced while navigating; a failed probe just means "not yet"
            match self.probe() {
                Ok(probe) if condition(&probe) => return Ok(true),
                Ok(_) => {}
                Err(e) => log::debug!("Probe failed while waiting: {}", e),
            }

            if started.elapsed() >= timeout {
                return Ok(false);
            }
            thread::sleep(poll);
        }
    }

    fn settle(&mut self, delay: Duration) {
        thread::sleep(delay);
    }

    fn expand_sections(&mut self) -> Result<()> {
        let clicked = self.session.evaluate(EXPAND_JS)?.and_then(|v| v.as_u64()).unwrap_or(0);
        if clicked > 0 {
            log::debug!("Expanded {} collapsed sections", clicked);
            thread::sleep(Duration::from_millis(500));
        }
        Ok(())
    }
}
