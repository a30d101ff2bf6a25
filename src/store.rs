//! Persisted scrape results
//!
//! Finished review runs and extracted products accumulate in a JSON file shaped
//! `{ "products": { "<asin>_<millis>": { metadata, reviews } }, "productInfo": [ ... ] }`
//! until they are exported to CSV and cleared.

use crate::{error::{Result, ScrapeError},
            export::{ProductCsvOptions, write_products, write_reviews},
            models::{ProductRecord, SessionEntry}};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs,
          path::{Path, PathBuf}};

/// On-disk layout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredData {
    #[serde(default)]
    pub products: IndexMap<String, SessionEntry>,
    #[serde(default)]
    pub product_info: Vec<ProductRecord>,
}

impl StoredData {
    /// Decode leniently: a missing or mistyped section becomes empty and
    /// entries that do not decode are dropped
    pub fn from_value(value: Value) -> Self {
        let mut data = StoredData::default();

        let Value::Object(mut root) = value else {
            log::warn!("Stored data is not an object, starting empty");
            return data;
        };

        if let Some(Value::Object(products)) = root.remove("products") {
            for (key, entry) in products {
                match serde_json::from_value::<SessionEntry>(entry) {
                    Ok(entry) => {
                        data.products.insert(key, entry);
                    }
                    Err(e) => log::warn!("Dropping stored session {}: {}", key, e),
                }
            }
        }

        if let Some(Value::Array(items)) = root.remove("productInfo") {
            for (i, item) in items.into_iter().enumerate() {
                match serde_json::from_value::<ProductRecord>(item) {
                    Ok(product) => data.product_info.push(product),
                    Err(e) => log::warn!("Dropping stored product #{}: {}", i, e),
                }
            }
        }

        data
    }
}

/// Counts shown to the user
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    /// Review runs stored
    pub product_sessions: usize,
    pub reviews: usize,
    /// Product detail records stored
    pub product_info: usize,
}

/// Files written by [`ScrapeStore::export`]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExportSummary {
    pub reviews_path: Option<PathBuf>,
    pub products_path: Option<PathBuf>,
    pub reviews: usize,
    pub products: usize,
}

impl ExportSummary {
    pub fn is_empty(&self) -> bool {
        self.reviews_path.is_none() && self.products_path.is_none()
    }
}

/// `2024-05-02T10-15-30-123Z`: an ISO timestamp that is safe in file names
pub fn file_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// JSON-file backed result store
#[derive(Debug)]
pub struct ScrapeStore {
    path: PathBuf,
    data: StoredData,
}

impl ScrapeStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                StoredData::default()
            } else {
                let value: Value = serde_json::from_str(&raw)
                    .map_err(|e| ScrapeError::Storage(format!("{} is not valid JSON: {}", path.display(), e)))?;
                StoredData::from_value(value)
            }
        } else {
            StoredData::default()
        };

        log::debug!("Opened store {} ({:?})", path.display(), Self::count(&data));
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &StoredData {
        &self.data
    }

    /// Write the store back to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Store a finished review run; returns its key
    pub fn add_session(&mut self, entry: SessionEntry) -> String {
        let base = format!("{}_{}", entry.metadata.asin, Utc::now().timestamp_millis());
        let mut key = base.clone();
        let mut n = 1;
        while self.data.products.contains_key(&key) {
            key = format!("{}-{}", base, n);
            n += 1;
        }

        log::info!("Stored {} reviews under {}", entry.reviews.len(), key);
        self.data.products.insert(key.clone(), entry);
        key
    }

    pub fn add_product(&mut self, product: ProductRecord) {
        log::info!("Stored product {}", product.asin);
        self.data.product_info.push(product);
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionEntry> {
        self.data.products.values()
    }

    /// Every stored product: standalone records first, then those paired with a review run
    pub fn products(&self) -> Vec<&ProductRecord> {
        Self::all_products(&self.data).collect()
    }

    fn all_products(data: &StoredData) -> impl Iterator<Item = &ProductRecord> {
        data.product_info
            .iter()
            .chain(data.products.values().filter_map(|e| e.product.as_ref()))
    }

    fn count(data: &StoredData) -> StoreStats {
        StoreStats {
            product_sessions: data.products.len(),
            reviews: data.products.values().map(|e| e.reviews.len()).sum(),
            product_info: Self::all_products(data).count(),
        }
    }

    pub fn stats(&self) -> StoreStats {
        Self::count(&self.data)
    }

    pub fn is_empty(&self) -> bool {
        self.data.products.is_empty() && self.data.product_info.is_empty()
    }

    /// Write `amz_reviews_<ts>.csv` and `amz_productInfo_<ts>.csv` into `dir`.
    /// A file is only written when there is something to put in it.
    pub fn export(&self, dir: impl AsRef<Path>, options: &ProductCsvOptions) -> Result<ExportSummary> {
        let dir = dir.as_ref();
        let mut summary = ExportSummary::default();

        if self.is_empty() {
            log::info!("Nothing to export");
            return Ok(summary);
        }

        fs::create_dir_all(dir)?;
        let timestamp = file_timestamp(Utc::now());

        let products: Vec<ProductRecord> = Self::all_products(&self.data).cloned().collect();
        if !products.is_empty() {
            let path = dir.join(format!("amz_productInfo_{}.csv", timestamp));
            write_products(fs::File::create(&path)?, &products, options)?;
            summary.products = products.len();
            summary.products_path = Some(path);
        }

        if !self.data.products.is_empty() {
            let entries: Vec<SessionEntry> = self.data.products.values().cloned().collect();
            let path = dir.join(format!("amz_reviews_{}.csv", timestamp));
            write_reviews(fs::File::create(&path)?, &entries)?;
            summary.reviews = entries.iter().map(|e| e.reviews.len()).sum();
            summary.reviews_path = Some(path);
        }

        log::info!(
            "Exported {} reviews and {} products to {}",
            summary.reviews,
            summary.products,
            dir.display()
        );
        Ok(summary)
    }

    /// Forget everything stored
    pub fn clear(&mut self) {
        self.data = StoredData::default();
    }
}
