//! Browser session management
//!
//! Launching or attaching to a Chrome/Chromium instance and the low-level tab
//! operations (navigate, read page source, evaluate scripts) the scraping agents
//! are built on.

pub mod config;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use session::BrowserSession;
