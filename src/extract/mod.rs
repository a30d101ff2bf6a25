//! Field extraction from parsed product and review pages
//!
//! Every extractor here is total: a selector that matches nothing, an attribute
//! that is missing or a pattern that fails yields `None` (products) or the
//! [`NOT_AVAILABLE`](crate::models::NOT_AVAILABLE) sentinel (reviews). Candidate
//! selectors are tried in priority order and the first element found wins.
//!
//! - [`text`]: sanitization and selector helpers
//! - [`images`]: gallery / A+ image collection and full-size URL rewriting
//! - [`specs`]: specification mining and bucket classification
//! - [`product`]: the product detail page extractor
//! - [`reviews`]: review-listing page extraction and pagination probes

pub mod images;
pub mod product;
pub mod reviews;
pub mod specs;
pub mod text;

pub use images::full_size_image_url;
pub use product::ProductExtractor;
pub use reviews::{NavigationMethod, PageProbe, ReviewPage, scrape_review_page};
pub use specs::SpecClassifier;
pub use text::sanitize_text;
