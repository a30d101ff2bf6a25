//! CSV serialization of scraped products and reviews
//!
//! Columns come out in a fixed order. A field is quoted only when it contains a
//! comma, a double quote or a line break, and embedded quotes are doubled.
//! Missing values are empty cells; lists and maps are written as JSON text.
//! Rows follow the insertion order of their input.

use crate::{error::{Result, ScrapeError},
            extract::sanitize_text,
            models::{ProductRecord, ReviewRecord, SessionEntry, SessionMetadata}};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io;

pub const REVIEW_COLUMNS: [&str; 13] = [
    "product_url",
    "asin",
    "product_name",
    "page_number",
    "reviewer_name",
    "reviewer_profile_link",
    "review_title",
    "review_star_rating",
    "review_date",
    "review_product_variation",
    "review_images",
    "is_vine_review",
    "actual_review",
];

pub const PRODUCT_COLUMNS: [&str; 26] = [
    "asin",
    "title",
    "brand",
    "price",
    "rating",
    "ratings_count",
    "availability",
    "category",
    "seller_info",
    "upc",
    "shop_url",
    "is_prime",
    "main_image_count",
    "aplus_image_count",
    "total_image_count",
    "main_product_images_json",
    "aplus_images_json",
    "features_json",
    "variations_json",
    "subscribe_save_json",
    "item_details_json",
    "measurements_json",
    "features_specs_json",
    "safety_info_json",
    "directions_json",
    "additional_details_json",
];

const MATERIALS_CARE_COLUMN: &str = "materials_care_json";

/// Layout switches for the product CSV
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductCsvOptions {
    /// Add `materials_care_json` right after `measurements_json`
    #[serde(default)]
    pub include_materials_care: bool,
}

impl ProductCsvOptions {
    pub fn with_materials_care() -> Self {
        Self {
            include_materials_care: true,
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = PRODUCT_COLUMNS.to_vec();
        if self.include_materials_care {
            let at = columns.iter().position(|c| *c == "measurements_json").map_or(columns.len(), |i| i + 1);
            columns.insert(at, MATERIALS_CARE_COLUMN);
        }
        columns
    }
}

fn csv_writer<W: io::Write>(writer: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn utf8(buffer: Vec<u8>) -> Result<String> {
    String::from_utf8(buffer).map_err(|e| ScrapeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn review_row(metadata: &SessionMetadata, review: &ReviewRecord) -> [String; 13] {
    [
        metadata.original_url.clone(),
        metadata.asin.clone(),
        metadata.product_name.clone(),
        review.page.to_string(),
        review.author.clone(),
        review.author_profile_link.clone(),
        review.title.clone(),
        review.rating.clone(),
        review.date.clone(),
        review.product_variation.clone(),
        review.images_cell(),
        review.is_vine_review.to_string(),
        review.text.clone(),
    ]
}

/// Write one row per review across every session, sessions in the given order
pub fn write_reviews<W: io::Write>(writer: W, entries: &[SessionEntry]) -> Result<()> {
    let mut out = csv_writer(writer);
    out.write_record(REVIEW_COLUMNS)?;

    for entry in entries {
        for review in &entry.reviews {
            out.write_record(review_row(&entry.metadata, review))?;
        }
    }

    out.flush()?;
    Ok(())
}

pub fn reviews_csv(entries: &[SessionEntry]) -> Result<String> {
    let mut buffer = Vec::new();
    write_reviews(&mut buffer, entries)?;
    utf8(buffer)
}

fn product_row(product: &ProductRecord, options: &ProductCsvOptions) -> Result<Vec<String>> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let sanitized = |values: &[String]| values.iter().map(|v| sanitize_text(v)).collect::<Vec<_>>();

    let variations = json!({
        "sizes": product.variations.sizes.as_deref().map(sanitized),
        "colors": product.variations.colors.as_deref().map(sanitized),
    });
    // keys without values are left out, as in the stored record
    let variations: serde_json::Map<String, serde_json::Value> = variations
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let subscribe_save = json!({
        "available": if product.subscribe_save.available { 1 } else { 0 },
        "discount": product.subscribe_save.discount.as_deref().map(sanitize_text),
    });

    let specs = &product.specs;
    let mut row = vec![
        product.asin.clone(),
        text(&product.title),
        text(&product.brand),
        text(&product.price),
        text(&product.rating),
        text(&product.ratings_count),
        text(&product.availability),
        text(&product.category),
        text(&product.seller_info),
        text(&product.upc),
        text(&product.shop_url),
        if product.is_prime { "1" } else { "0" }.to_string(),
        product.main_image_count().to_string(),
        product.aplus_image_count().to_string(),
        product.total_image_count().to_string(),
        to_json(&sanitized(&product.main_product_images))?,
        to_json(&sanitized(&product.aplus_images))?,
        to_json(&sanitized(&product.features))?,
        to_json(&variations)?,
        to_json(&subscribe_save)?,
        to_json(&specs.item_details)?,
        to_json(&specs.measurements)?,
        to_json(&specs.features_specs)?,
        to_json(&sanitized(&specs.safety_info))?,
        to_json(&sanitized(&specs.directions))?,
        to_json(&specs.additional_details)?,
    ];

    if options.include_materials_care {
        let at = PRODUCT_COLUMNS
            .iter()
            .position(|c| *c == "measurements_json")
            .map_or(row.len(), |i| i + 1);
        row.insert(at, to_json(&specs.materials_care)?);
    }

    Ok(row)
}

/// Write one row per product record
pub fn write_products<W: io::Write>(writer: W, products: &[ProductRecord], options: &ProductCsvOptions) -> Result<()> {
    let mut out = csv_writer(writer);
    out.write_record(options.columns())?;

    for product in products {
        out.write_record(product_row(product, options)?)?;
    }

    out.flush()?;
    Ok(())
}

pub fn products_csv(products: &[ProductRecord], options: &ProductCsvOptions) -> Result<String> {
    let mut buffer = Vec::new();
    write_products(&mut buffer, products, options)?;
    utf8(buffer)
}
