//! Product gallery and A+ content images

use crate::extract::text::{select_all, select_first};
use indexmap::IndexSet;
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

/// Thumbnail size/crop suffixes, applied in order, first occurrence each
static SIZE_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\._[A-Z]+\d+[^.]*_\.",
        r"\._SS\d+_\.",
        r"\._SX\d+_\.",
        r"\._AC_[^.]*_\.",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Placeholder images the gallery and A+ blocks are padded with
const PLACEHOLDER_MARKERS: [&str; 3] = ["360_icon", "grey-pixel", "transparent-pixel"];

/// Rewrite a thumbnail URL to the full-size image it was derived from.
///
/// Lossy: this only knows the current suffix conventions and returns a guess.
pub fn full_size_image_url(src: &str) -> String {
    let mut full = src.to_string();
    for pattern in SIZE_SUFFIXES.iter() {
        full = pattern.replace(&full, ".").into_owned();
    }

    if let Some(stripped) = full.strip_suffix('.') {
        full = format!("{}.jpg", stripped);
    }

    full
}

fn is_placeholder(src: &str) -> bool {
    PLACEHOLDER_MARKERS.iter().any(|marker| src.contains(marker))
}

/// Landing image followed by gallery thumbnails, full-size and deduplicated
pub fn main_product_images(document: &Html) -> Vec<String> {
    let root = document.root_element();
    let mut images = IndexSet::new();

    if let Some(src) = select_first(root, "img#landingImage").and_then(|img| img.value().attr("src")) {
        if !src.is_empty() {
            images.insert(full_size_image_url(src));
        }
    }

    if let Some(thumbs) = select_first(root, "div#altImages") {
        for img in select_all(thumbs, "img") {
            let src = img.value().attr("src").unwrap_or("");
            if src.contains("images/I/") && !is_placeholder(src) {
                images.insert(full_size_image_url(src));
            }
        }
    }

    images.into_iter().collect()
}

/// Images inside the A+ (enhanced brand content) block, lazy-load source preferred
pub fn aplus_images(document: &Html) -> Vec<String> {
    let Some(section) = select_first(document.root_element(), "div#aplus") else {
        return Vec::new();
    };

    select_all(section, "img")
        .into_iter()
        .filter_map(|img| {
            let src = img.value().attr("data-src").or_else(|| img.value().attr("src")).unwrap_or("");
            let hosted = src.contains("aplus-media") || (src.contains("media-amazon.com") && src.contains("images/S/"));
            (hosted && !is_placeholder(src)).then(|| src.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_size_ac_suffix() {
        assert_eq!(
            full_size_image_url("https://m.media-amazon.com/images/I/71abc._AC_SX679_.jpg"),
            "https://m.media-amazon.com/images/I/71abc.jpg"
        );
    }

    #[test]
    fn test_full_size_size_suffix() {
        assert_eq!(
            full_size_image_url("https://m.media-amazon.com/images/I/41xyz._SS40_.jpg"),
            "https://m.media-amazon.com/images/I/41xyz.jpg"
        );
        assert_eq!(
            full_size_image_url("https://m.media-amazon.com/images/I/41xyz._SX38_SY50_CR,0,0,38,50_.jpg"),
            "https://m.media-amazon.com/images/I/41xyz.jpg"
        );
    }

    #[test]
    fn test_full_size_trailing_dot() {
        assert_eq!(full_size_image_url("https://img/I/abc._SS40_."), "https://img/I/abc.jpg");
    }

    #[test]
    fn test_full_size_untouched() {
        let plain = "https://m.media-amazon.com/images/I/71abc.jpg";
        assert_eq!(full_size_image_url(plain), plain);
    }

    #[test]
    fn test_main_product_images() {
        let doc = Html::parse_document(
            r#"<body>
                <img id="landingImage" src="https://m.media-amazon.com/images/I/main._AC_SX679_.jpg">
                <div id="altImages">
                    <img src="https://m.media-amazon.com/images/I/main._AC_US40_.jpg">
                    <img src="https://m.media-amazon.com/images/I/side._SS40_.jpg">
                    <img src="https://m.media-amazon.com/images/I/360_icon._SS40_.png">
                    <img src="https://m.media-amazon.com/images/G/grey-pixel.gif">
                </div>
            </body>"#,
        );

        assert_eq!(
            main_product_images(&doc),
            vec![
                "https://m.media-amazon.com/images/I/main.jpg".to_string(),
                "https://m.media-amazon.com/images/I/side.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_aplus_images() {
        let doc = Html::parse_document(
            r#"<div id="aplus">
                <img src="https://m.media-amazon.com/images/G/grey-pixel.gif" data-src="https://m.media-amazon.com/images/S/aplus-media-library/a.jpg">
                <img src="https://m.media-amazon.com/images/S/stores/b.png">
                <img src="https://example.com/other.png">
            </div>"#,
        );

        assert_eq!(
            aplus_images(&doc),
            vec![
                "https://m.media-amazon.com/images/S/aplus-media-library/a.jpg".to_string(),
                "https://m.media-amazon.com/images/S/stores/b.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_sections() {
        let doc = Html::parse_document("<p>nothing</p>");
        assert!(main_product_images(&doc).is_empty());
        assert!(aplus_images(&doc).is_empty());
    }
}
