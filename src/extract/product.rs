use crate::{extract::{images::{aplus_images, main_product_images},
                      specs::{SpecClassifier, resolve_specs},
                      text::{body, first_text, next_element_sibling, sanitize_text, select_all, select_first, text_content,
                             trimmed_text}},
            models::{ProductRecord, SubscribeSave, Variations}};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Upper bound on feature bullets kept per product
pub const MAX_FEATURES: usize = 10;

/// Upper bound on values kept per variation list
pub const MAX_VARIATIONS: usize = 15;

const PRICE_SELECTORS: [&str; 3] = ["span.a-offscreen", "span.a-price-whole", ".a-price .a-offscreen"];

static PRICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$?([,\d]+\.?\d*)").expect("valid regex"));
static RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("valid regex"));
static COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([\d,]+)").expect("valid regex"));
static UPC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)UPC[\s:]*(\d{12,13})",
        r"(?i)UPCA?[\s:]*(\d{12,13})",
        r"(?i)Universal Product Code[\s:]*(\d{12,13})",
        r"(?i)Product Code[\s:]*(\d{12,13})",
        r"(?i)Barcode[\s:]*(\d{12,13})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static VISIT_STORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)visit.*store").expect("valid regex"));
static SIZE_SELECT_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)size|dropdown").expect("valid regex"));
static VARIATION_CONTAINER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)variation.*(color|style)").expect("valid regex"));
static STYLE_NAME_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)style.*name|color.*name").expect("valid regex"));
static COLOR_IMAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"colorImages"\s*:\s*(\{.*?\})"#).expect("valid regex"));
static DIMENSION_VALUES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"dimensionValuesDisplayData"\s*:\s*(\{.*?\})"#).expect("valid regex"));
static SUBSCRIBE_SAVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)subscribe\s*&\s*save").expect("valid regex"));
static SUBSCRIBE_DISCOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)%.*subscribe\s*&\s*save").expect("valid regex"));

/// Extracts a [`ProductRecord`] from a product detail page
#[derive(Debug, Clone)]
pub struct ProductExtractor {
    /// Scheme and host prefixed to site-relative links, e.g. `https://www.amazon.com`
    pub origin: String,
    pub classifier: SpecClassifier,
}

impl Default for ProductExtractor {
    fn default() -> Self {
        Self {
            origin: "https://www.amazon.com".to_string(),
            classifier: SpecClassifier::default(),
        }
    }
}

impl ProductExtractor {
    pub fn new(origin: impl Into<String>, classifier: SpecClassifier) -> Self {
        Self {
            origin: origin.into(),
            classifier,
        }
    }

    /// Parse `html` and extract it
    pub fn extract_html(&self, html: &str, asin: &str, product_url: &str) -> ProductRecord {
        self.extract(&Html::parse_document(html), asin, product_url)
    }

    pub fn extract(&self, document: &Html, asin: &str, product_url: &str) -> ProductRecord {
        let root = document.root_element();
        let mut product = ProductRecord::new(asin, product_url);

        product.title = first_text(root, &["#productTitle"]).map(|t| sanitize_text(&t));
        product.brand = select_first(root, "#bylineInfo").map(|el| {
            let byline = text_content(el)
                .replacen("Visit the", "", 1)
                .replacen("Store", "", 1)
                .replacen("Brand:", "", 1);
            sanitize_text(&byline)
        });
        product.price = extract_price(root);
        product.rating = select_first(root, "span.a-icon-alt")
            .and_then(|el| RATING.captures(&text_content(el)).map(|c| c[1].to_string()));
        product.ratings_count = select_first(root, "#acrCustomerReviewText")
            .and_then(|el| COUNT.captures(&text_content(el)).map(|c| c[1].replace(',', "")));
        product.availability = select_first(root, "#availability span").map(|el| sanitize_text(&text_content(el)));
        product.category = extract_category(root);
        product.seller_info = extract_seller(root);
        product.upc = extract_upc(document);
        product.shop_url = self.extract_shop_url(root);
        product.is_prime = detect_prime(root);

        product.main_product_images = main_product_images(document);
        product.aplus_images = aplus_images(document);
        product.features = extract_features(root);
        product.variations = extract_variations(root);
        product.subscribe_save = extract_subscribe_save(document);
        product.specs = resolve_specs(document, &self.classifier);

        log::debug!(
            "Extracted product {} ({} images, {} features)",
            asin,
            product.total_image_count(),
            product.features.len()
        );

        product
    }

    fn extract_shop_url(&self, root: ElementRef<'_>) -> Option<String> {
        let links = select_all(root, "a");

        let store_link = links
            .iter()
            .find(|a| a.value().attr("href").is_some_and(|href| href.contains("/stores/")))
            .or_else(|| links.iter().find(|a| VISIT_STORE.is_match(&text_content(**a))))?;

        let href = store_link.value().attr("href").unwrap_or_default();
        if href.starts_with('/') {
            Some(format!("{}{}", self.origin, href))
        } else if href.starts_with("http") {
            Some(href.to_string())
        } else {
            None
        }
    }
}

fn extract_price(root: ElementRef<'_>) -> Option<String> {
    for css in PRICE_SELECTORS {
        let Some(el) = select_first(root, css) else {
            continue;
        };
        if let Some(caps) = PRICE.captures(text_content(el).trim()) {
            return Some(caps[1].replace(',', ""));
        }
    }
    None
}

fn extract_category(root: ElementRef<'_>) -> Option<String> {
    let crumbs = select_all(root, "#wayfinding-breadcrumbs_feature_div a");
    if crumbs.is_empty() {
        return None;
    }

    let joined = crumbs.into_iter().map(text_content).collect::<Vec<_>>().join(" > ");
    Some(sanitize_text(&joined))
}

/// "Ships from" label plus the seller named in the feature row next to it
fn extract_seller(root: ElementRef<'_>) -> Option<String> {
    let ships_from = select_all(root, "span")
        .into_iter()
        .find(|span| text_content(*span).contains("Ships from"))?;

    let seller = ships_from
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div" && el.value().attr("offer-display-feature-name").is_some())
        .and_then(next_element_sibling)
        .and_then(|row| select_first(row, "span"))
        .map(|span| text_content(span).trim().to_string())
        .unwrap_or_default();

    let combined = format!("{} {}", text_content(ships_from).trim(), seller);
    Some(sanitize_text(combined.trim()))
}

fn find_upc(text: &str) -> Option<String> {
    UPC_PATTERNS
        .iter()
        .find_map(|p| p.captures(text).map(|c| c[1].to_string()))
}

/// UPC from the detail bullets, the technical specs, the whole page and finally JSON-LD
fn extract_upc(document: &Html) -> Option<String> {
    let root = document.root_element();

    for section in ["#detailBullets_feature_div", "#technicalSpecifications_feature_div"] {
        if let Some(upc) = select_first(root, section).and_then(|el| find_upc(&text_content(el))) {
            return Some(upc);
        }
    }

    if let Some(upc) = find_upc(&text_content(body(document))) {
        return Some(upc);
    }

    for script in select_all(root, r#"script[type="application/ld+json"]"#) {
        let Ok(json) = serde_json::from_str::<Value>(&text_content(script)) else {
            continue;
        };

        let gtin = ["gtin", "gtin12", "gtin13"].iter().find_map(|key| match json.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        });
        if gtin.is_some() {
            return gtin;
        }
    }

    None
}

fn detect_prime(root: ElementRef<'_>) -> bool {
    select_first(root, r#"i[class*="prime"]"#).is_some()
        || select_all(root, "span").into_iter().any(|span| text_content(span).contains("Prime"))
        || select_first(root, r#"img[alt*="Prime"]"#).is_some()
}

fn extract_features(root: ElementRef<'_>) -> Vec<String> {
    let Some(bullets) = select_first(root, "#feature-bullets") else {
        return Vec::new();
    };

    select_all(bullets, "span.a-list-item")
        .into_iter()
        .map(|span| text_content(span).trim().to_string())
        .filter(|text| text.chars().count() > 10 && !text.starts_with("Make sure"))
        .take(MAX_FEATURES)
        .collect()
}

fn is_prompt(text: &str, prompts: &[&str]) -> bool {
    let lower = text.to_lowercase();
    prompts.contains(&lower.as_str())
}

fn capped(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.into_iter().take(MAX_VARIATIONS).collect())
    }
}

/// Sizes and colours/styles, each from the first source that yields any values
fn extract_variations(root: ElementRef<'_>) -> Variations {
    let mut variations = Variations::default();

    for select in select_all(root, "select") {
        let name = select.value().attr("name").unwrap_or_default();
        if !SIZE_SELECT_NAME.is_match(name) {
            continue;
        }

        let options: Vec<String> = select_all(select, "option")
            .into_iter()
            .filter_map(trimmed_text)
            .filter(|t| !is_prompt(t, &["select", "choose", "pick"]))
            .collect();
        if let Some(sizes) = capped(options) {
            variations.sizes = Some(sizes);
            break;
        }
    }

    let containers = select_all(root, "div, ul")
        .into_iter()
        .filter(|el| el.value().attr("id").is_some_and(|id| VARIATION_CONTAINER_ID.is_match(id)));
    for container in containers {
        let values: Vec<String> = select_all(container, "li, span, button")
            .into_iter()
            .filter_map(|item| {
                let attr = |name: &str| item.value().attr(name).filter(|v| !v.is_empty()).map(str::to_string);
                attr("title")
                    .or_else(|| attr("aria-label"))
                    .or_else(|| trimmed_text(item))
            })
            .filter(|name| name.chars().count() < 100 && !is_prompt(name, &["select", "choose"]))
            .collect();
        if let Some(colors) = capped(values) {
            variations.colors = Some(colors);
            break;
        }
    }

    if variations.colors.is_none() {
        let styles: Vec<String> = select_all(root, "span, div")
            .into_iter()
            .filter(|el| el.value().attr("class").is_some_and(|c| STYLE_NAME_CLASS.is_match(c)))
            .filter_map(trimmed_text)
            .filter(|t| t.chars().count() < 100)
            .collect();
        variations.colors = capped(styles);
    }

    if variations.colors.is_none() {
        variations_from_scripts(root, &mut variations);
    }

    variations
}

fn object_keys(pattern: &Regex, source: &str) -> Option<Vec<String>> {
    let caps = pattern.captures(source)?;
    match serde_json::from_str::<Map<String, Value>>(&caps[1]) {
        Ok(object) => capped(object.keys().cloned().collect()),
        Err(e) => {
            log::debug!("Skipping unparseable variation JSON: {}", e);
            None
        }
    }
}

fn variations_from_scripts(root: ElementRef<'_>, variations: &mut Variations) {
    for script in select_all(root, "script") {
        let source = text_content(script);
        if !(source.contains("colorImages") || source.contains("dimensionValuesDisplayData")) {
            continue;
        }

        if let Some(colors) = object_keys(&COLOR_IMAGES, &source) {
            variations.colors = Some(colors);
            break;
        }

        if variations.sizes.is_none() {
            variations.sizes = object_keys(&DIMENSION_VALUES, &source);
        }
    }
}

fn extract_subscribe_save(document: &Html) -> SubscribeSave {
    let text = text_content(body(document));
    if !SUBSCRIBE_SAVE.is_match(&text) {
        return SubscribeSave::default();
    }

    SubscribeSave {
        available: true,
        discount: SUBSCRIBE_DISCOUNT.captures(&text).map(|c| format!("{}%", &c[1])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r#"
        <html><body>
            <div id="wayfinding-breadcrumbs_feature_div">
                <a> Home &amp; Kitchen </a><a>Kitchen &amp; Dining</a><a>Mugs</a>
            </div>
            <span id="productTitle">
                Acme   Ceramic Mug, 12 oz
            </span>
            <a id="bylineInfo" href="/stores/Acme/page/123">Visit the Acme Store</a>
            <span class="a-price"><span class="a-offscreen">$1,299.99</span></span>
            <span class="a-icon-alt">4.6 out of 5 stars</span>
            <span id="acrCustomerReviewText">1,234 ratings</span>
            <div id="availability"><span> In Stock </span></div>
            <div offer-display-feature-name="desktop-fulfiller-info"><span>Ships from</span></div>
            <div class="offer-display-feature-text"><span>Amazon.com</span></div>
            <i class="a-icon a-icon-prime"></i>
            <div id="feature-bullets"><ul>
                <li><span class="a-list-item">Make sure this fits by entering your model number.</span></li>
                <li><span class="a-list-item">Dishwasher and microwave safe</span></li>
                <li><span class="a-list-item">Short</span></li>
            </ul></div>
            <select name="dropdown_selected_size_name">
                <option>Select</option><option>Small</option><option>Large</option>
            </select>
            <ul id="variation_color_name">
                <li title="Blue"></li><li aria-label="Red"></li><li>Green</li>
            </ul>
            <div id="detailBullets_feature_div">UPC : 012345678905</div>
            <p>Save 15% with Subscribe &amp; Save</p>
        </body></html>
    "#;

    fn product() -> ProductRecord {
        ProductExtractor::default().extract_html(PRODUCT_PAGE, "B000TEST01", "https://www.amazon.com/dp/B000TEST01")
    }

    #[test]
    fn test_scalar_fields() {
        let p = product();
        assert_eq!(p.asin, "B000TEST01");
        assert_eq!(p.title.as_deref(), Some("Acme Ceramic Mug, 12 oz"));
        assert_eq!(p.brand.as_deref(), Some("Acme"));
        assert_eq!(p.price.as_deref(), Some("1299.99"));
        assert_eq!(p.rating.as_deref(), Some("4.6"));
        assert_eq!(p.ratings_count.as_deref(), Some("1234"));
        assert_eq!(p.availability.as_deref(), Some("In Stock"));
        assert_eq!(p.category.as_deref(), Some("Home & Kitchen > Kitchen & Dining > Mugs"));
        assert_eq!(p.seller_info.as_deref(), Some("Ships from Amazon.com"));
        assert_eq!(p.upc.as_deref(), Some("012345678905"));
        assert_eq!(p.shop_url.as_deref(), Some("https://www.amazon.com/stores/Acme/page/123"));
        assert!(p.is_prime);
    }

    #[test]
    fn test_features_filtered() {
        assert_eq!(product().features, vec!["Dishwasher and microwave safe".to_string()]);
    }

    #[test]
    fn test_variations() {
        let v = product().variations;
        assert_eq!(v.sizes, Some(vec!["Small".to_string(), "Large".to_string()]));
        assert_eq!(
            v.colors,
            Some(vec!["Blue".to_string(), "Red".to_string(), "Green".to_string()])
        );
    }

    #[test]
    fn test_subscribe_save() {
        let s = product().subscribe_save;
        assert!(s.available);
        assert_eq!(s.discount.as_deref(), Some("15%"));
    }

    #[test]
    fn test_empty_page_yields_nulls() {
        let p = ProductExtractor::default().extract_html("<html><body></body></html>", "B000TEST01", "u");
        assert!(p.title.is_none());
        assert!(p.brand.is_none());
        assert!(p.price.is_none());
        assert!(p.category.is_none());
        assert!(p.seller_info.is_none());
        assert!(p.upc.is_none());
        assert!(p.shop_url.is_none());
        assert!(!p.is_prime);
        assert!(p.features.is_empty());
        assert!(p.variations.is_empty());
        assert!(!p.subscribe_save.available);
    }

    #[test]
    fn test_variations_from_script_json() {
        let html = r#"<script>var data = {"colorImages": {"Black": [], "White": []}, "x": 1};</script>"#;
        let p = ProductExtractor::default().extract_html(html, "B000TEST01", "u");
        assert_eq!(p.variations.colors, Some(vec!["Black".to_string(), "White".to_string()]));
    }

    #[test]
    fn test_unparseable_script_json_is_skipped() {
        let html = r#"<script>var data = {"colorImages": {"Black": [{"a": 1}], "White": []}};</script>"#;
        let p = ProductExtractor::default().extract_html(html, "B000TEST01", "u");
        assert!(p.variations.colors.is_none());
    }

    #[test]
    fn test_upc_from_json_ld() {
        let html = r#"<script type="application/ld+json">{"@type": "Product", "gtin13": "0012345678905"}</script>"#;
        let p = ProductExtractor::default().extract_html(html, "B000TEST01", "u");
        assert_eq!(p.upc.as_deref(), Some("0012345678905"));
    }

    #[test]
    fn test_shop_url_by_link_text() {
        let html = r#"<a href="https://brand.example/shop">Visit the Brand Store</a>"#;
        let p = ProductExtractor::default().extract_html(html, "B000TEST01", "u");
        assert_eq!(p.shop_url.as_deref(), Some("https://brand.example/shop"));

        let relative = r#"<a href="shop">Visit the Brand Store</a>"#;
        let p = ProductExtractor::default().extract_html(relative, "B000TEST01", "u");
        assert!(p.shop_url.is_none());
    }
}
