//! Records produced by the extractors and accumulated by a scrape run
//!
//! - [`ProductRecord`]: one product detail page, keyed by ASIN
//! - [`ReviewRecord`]: one review fragment from a review-listing page
//! - [`ScrapeSession`]: the deduplicating accumulator owned by a pagination run

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Sentinel stored for review fields the page did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Product name used when the review page header cannot be found
pub const PRODUCT_NAME_NOT_FOUND: &str = "Product Name Not Found";

/// A single review scraped from a review-listing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    /// DOM id of the review block, or a synthesized `review-{page}-{offset}` key
    pub id: String,

    /// 1-based position in the accumulated run
    #[serde(default)]
    pub index: usize,

    /// Review-listing page the review was found on
    pub page: u32,

    pub title: String,
    pub rating: String,
    pub author: String,
    pub author_profile_link: String,

    /// Date line as displayed, e.g. "Reviewed in the United States on May 2, 2024"
    pub date: String,

    pub verified: bool,
    pub helpful: String,
    pub product_variation: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub is_vine_review: bool,

    pub text: String,
}

impl ReviewRecord {
    /// A record with every text field set to the sentinel
    pub fn empty(id: impl Into<String>, page: u32) -> Self {
        Self {
            id: id.into(),
            index: 0,
            page,
            title: NOT_AVAILABLE.to_string(),
            rating: NOT_AVAILABLE.to_string(),
            author: NOT_AVAILABLE.to_string(),
            author_profile_link: NOT_AVAILABLE.to_string(),
            date: NOT_AVAILABLE.to_string(),
            verified: false,
            helpful: NOT_AVAILABLE.to_string(),
            product_variation: NOT_AVAILABLE.to_string(),
            images: Vec::new(),
            is_vine_review: false,
            text: NOT_AVAILABLE.to_string(),
        }
    }

    /// Builder method: set title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder method: set body text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Image cell as exported: empty, the single URL, or a JSON array for several
    pub fn images_cell(&self) -> String {
        match self.images.as_slice() {
            [] => String::new(),
            [single] => single.clone(),
            many => serde_json::to_string(many).unwrap_or_default(),
        }
    }
}

/// Buckets a mined key/value pair can be classified into
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpecBucket {
    #[default]
    ItemDetails,
    Measurements,
    MaterialsCare,
    FeaturesSpecs,
    AdditionalDetails,
}

impl SpecBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecBucket::ItemDetails => "item_details",
            SpecBucket::Measurements => "measurements",
            SpecBucket::MaterialsCare => "materials_care",
            SpecBucket::FeaturesSpecs => "features_specs",
            SpecBucket::AdditionalDetails => "additional_details",
        }
    }
}

/// Categorized specification tables
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecBuckets {
    pub item_details: IndexMap<String, String>,
    pub measurements: IndexMap<String, String>,
    pub materials_care: IndexMap<String, String>,
    pub features_specs: IndexMap<String, String>,
    pub additional_details: IndexMap<String, String>,
    pub safety_info: Vec<String>,
    pub directions: Vec<String>,
}

impl SpecBuckets {
    pub fn bucket(&self, bucket: SpecBucket) -> &IndexMap<String, String> {
        match bucket {
            SpecBucket::ItemDetails => &self.item_details,
            SpecBucket::Measurements => &self.measurements,
            SpecBucket::MaterialsCare => &self.materials_care,
            SpecBucket::FeaturesSpecs => &self.features_specs,
            SpecBucket::AdditionalDetails => &self.additional_details,
        }
    }

    pub fn bucket_mut(&mut self, bucket: SpecBucket) -> &mut IndexMap<String, String> {
        match bucket {
            SpecBucket::ItemDetails => &mut self.item_details,
            SpecBucket::Measurements => &mut self.measurements,
            SpecBucket::MaterialsCare => &mut self.materials_care,
            SpecBucket::FeaturesSpecs => &mut self.features_specs,
            SpecBucket::AdditionalDetails => &mut self.additional_details,
        }
    }

    /// Insert a pair; a repeated key keeps its original position and takes the new value
    pub fn insert(&mut self, bucket: SpecBucket, key: impl Into<String>, value: impl Into<String>) {
        self.bucket_mut(bucket).insert(key.into(), value.into());
    }
}

/// Size and colour/style options offered on the product page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Variations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
}

impl Variations {
    pub fn is_empty(&self) -> bool {
        self.sizes.is_none() && self.colors.is_none()
    }
}

/// Subscribe & Save offer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscribeSave {
    pub available: bool,

    /// Discount as displayed, e.g. "15%"
    pub discount: Option<String>,
}

/// Everything extracted from one product detail page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    /// Join key to the product's reviews
    pub asin: String,
    pub product_url: String,
    pub scrape_timestamp: DateTime<Utc>,

    pub title: Option<String>,
    pub brand: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub ratings_count: Option<String>,
    pub availability: Option<String>,
    pub category: Option<String>,
    pub seller_info: Option<String>,
    pub upc: Option<String>,
    pub shop_url: Option<String>,
    pub is_prime: bool,

    #[serde(default)]
    pub main_product_images: Vec<String>,
    #[serde(default)]
    pub aplus_images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub variations: Variations,
    #[serde(default)]
    pub subscribe_save: SubscribeSave,
    #[serde(default)]
    pub specs: SpecBuckets,
}

impl ProductRecord {
    /// An empty record for `asin`; every optional field starts as `None`
    pub fn new(asin: impl Into<String>, product_url: impl Into<String>) -> Self {
        Self {
            asin: asin.into(),
            product_url: product_url.into(),
            scrape_timestamp: Utc::now(),
            title: None,
            brand: None,
            price: None,
            rating: None,
            ratings_count: None,
            availability: None,
            category: None,
            seller_info: None,
            upc: None,
            shop_url: None,
            is_prime: false,
            main_product_images: Vec::new(),
            aplus_images: Vec::new(),
            features: Vec::new(),
            variations: Variations::default(),
            subscribe_save: SubscribeSave::default(),
            specs: SpecBuckets::default(),
        }
    }

    pub fn main_image_count(&self) -> usize {
        self.main_product_images.len()
    }

    pub fn aplus_image_count(&self) -> usize {
        self.aplus_images.len()
    }

    pub fn total_image_count(&self) -> usize {
        self.main_image_count() + self.aplus_image_count()
    }
}

/// Summary persisted next to a run's reviews
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub asin: String,
    pub original_url: String,
    pub reviews_url: String,
    pub scrape_date: DateTime<Utc>,
    pub total_reviews: usize,
    pub pages_scraped: u32,
    pub product_name: String,
}

/// A finished run as persisted: metadata plus reviews in insertion order,
/// and the product page they belong to when it was extracted in the same run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEntry {
    pub metadata: SessionMetadata,
    pub reviews: Vec<ReviewRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRecord>,
}

/// Accumulator for one pagination run.
///
/// Owned exclusively by the controller while the run is active. Reviews keep the
/// order they were first seen in; a review whose id was already recorded is dropped.
#[derive(Debug, Clone)]
pub struct ScrapeSession {
    pub asin: String,
    pub original_url: String,
    pub reviews_url: String,
    pub product_name: String,
    pub scrape_date: DateTime<Utc>,
    pub pages_scraped: u32,
    pub product: Option<ProductRecord>,
    reviews: Vec<ReviewRecord>,
    seen: HashSet<String>,
}

impl ScrapeSession {
    pub fn new(asin: impl Into<String>, original_url: impl Into<String>, reviews_url: impl Into<String>) -> Self {
        Self {
            asin: asin.into(),
            original_url: original_url.into(),
            reviews_url: reviews_url.into(),
            product_name: PRODUCT_NAME_NOT_FOUND.to_string(),
            scrape_date: Utc::now(),
            pages_scraped: 0,
            product: None,
            reviews: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append one page's reviews, skipping ids already recorded. Returns how many were added.
    pub fn record_page(&mut self, page: u32, reviews: Vec<ReviewRecord>) -> usize {
        let before = self.reviews.len();

        for mut review in reviews {
            if !self.seen.insert(review.id.clone()) {
                log::debug!("Skipping duplicate review: {}", review.id);
                continue;
            }
            review.index = self.reviews.len() + 1;
            self.reviews.push(review);
        }

        self.pages_scraped = self.pages_scraped.max(page);
        self.reviews.len() - before
    }

    /// Attach the product record this run's reviews belong to
    pub fn attach_product(&mut self, product: ProductRecord) {
        self.product = Some(product);
    }

    pub fn reviews(&self) -> &[ReviewRecord] {
        &self.reviews
    }

    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            asin: self.asin.clone(),
            original_url: self.original_url.clone(),
            reviews_url: self.reviews_url.clone(),
            scrape_date: self.scrape_date,
            total_reviews: self.reviews.len(),
            pages_scraped: self.pages_scraped,
            product_name: self.product_name.clone(),
        }
    }

    /// Finalize into the persisted shape
    pub fn into_entry(self) -> SessionEntry {
        let metadata = self.metadata();
        SessionEntry {
            metadata,
            reviews: self.reviews,
            product: self.product,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(id: &str, page: u32) -> ReviewRecord {
        ReviewRecord::empty(id, page).with_title(format!("title {}", id))
    }

    #[test]
    fn test_record_page_dedups_across_pages() {
        let mut session = ScrapeSession::new("B000TEST01", "https://www.amazon.com/dp/B000TEST01", "reviews");

        assert_eq!(session.record_page(1, vec![review("r1", 1), review("r2", 1)]), 2);
        assert_eq!(session.record_page(2, vec![review("r2", 2), review("r3", 2)]), 1);

        let ids: Vec<_> = session.reviews().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        // first occurrence wins
        assert_eq!(session.reviews()[1].page, 1);
        assert_eq!(session.pages_scraped, 2);
    }

    #[test]
    fn test_record_page_assigns_running_index() {
        let mut session = ScrapeSession::new("B000TEST01", "u", "r");
        session.record_page(1, vec![review("a", 1), review("b", 1)]);
        session.record_page(2, vec![review("c", 2)]);

        let indices: Vec<_> = session.reviews().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_into_entry_metadata() {
        let mut session = ScrapeSession::new("B000TEST01", "orig", "rev");
        session.product_name = "Widget".to_string();
        session.record_page(1, vec![review("a", 1)]);

        let entry = session.into_entry();
        assert_eq!(entry.metadata.total_reviews, 1);
        assert_eq!(entry.metadata.pages_scraped, 1);
        assert_eq!(entry.metadata.product_name, "Widget");
        assert_eq!(entry.reviews.len(), 1);
        assert!(entry.product.is_none());
        assert!(serde_json::to_value(&entry).unwrap().get("product").is_none());
    }

    #[test]
    fn test_attached_product_travels_with_entry() {
        let mut session = ScrapeSession::new("B000TEST01", "orig", "rev");
        session.record_page(1, vec![review("a", 1)]);
        session.attach_product(ProductRecord::new("B000TEST01", "orig"));

        let entry = session.into_entry();
        assert_eq!(entry.product.as_ref().map(|p| p.asin.as_str()), Some("B000TEST01"));

        let back: SessionEntry = serde_json::from_value(serde_json::to_value(&entry).unwrap()).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_images_cell() {
        let mut r = review("a", 1);
        assert_eq!(r.images_cell(), "");

        r.images = vec!["https://img/1.jpg".to_string()];
        assert_eq!(r.images_cell(), "https://img/1.jpg");

        r.images.push("https://img/2.jpg".to_string());
        assert_eq!(r.images_cell(), r#"["https://img/1.jpg","https://img/2.jpg"]"#);
    }

    #[test]
    fn test_review_serializes_camel_case() {
        let json = serde_json::to_value(review("a", 3)).unwrap();
        assert_eq!(json["authorProfileLink"], "N/A");
        assert_eq!(json["isVineReview"], false);
        assert_eq!(json["page"], 3);
    }

    #[test]
    fn test_spec_bucket_insert_keeps_position() {
        let mut specs = SpecBuckets::default();
        specs.insert(SpecBucket::Measurements, "Weight", "1 lb");
        specs.insert(SpecBucket::Measurements, "Height", "2 in");
        specs.insert(SpecBucket::Measurements, "Weight", "2 lb");

        let keys: Vec<_> = specs.measurements.keys().cloned().collect();
        assert_eq!(keys, vec!["Weight", "Height"]);
        assert_eq!(specs.measurements["Weight"], "2 lb");
    }

    #[test]
    fn test_image_counts() {
        let mut product = ProductRecord::new("B000TEST01", "url");
        product.main_product_images = vec!["a".into(), "b".into()];
        product.aplus_images = vec!["c".into()];

        assert_eq!(product.main_image_count(), 2);
        assert_eq!(product.aplus_image_count(), 1);
        assert_eq!(product.total_image_count(), 3);
        assert!(product.price.is_none());
    }
}
