use crate::{extract::text::{first_match, first_text, select_all, select_first, text_content, trimmed_text},
            models::{NOT_AVAILABLE, PRODUCT_NAME_NOT_FOUND, ReviewRecord}};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use url::Url;

const REVIEW_BLOCK: &str = r#"[data-hook="review"]"#;
const PAGE_INDICATOR: &str = ".a-pagination .a-selected";
const NEXT_CONTROLS: [&str; 2] = ["li.a-last:not(.a-disabled) a", ".a-pagination .a-last:not(.a-disabled)"];
const PAGE_LINKS: &str = ".a-pagination li:not(.a-selected) a";
const PAGINATION_FORM: &str = r#"form[action*="product-reviews"]"#;
const PAGE_NUMBER_INPUT: &str = r#"input[name="pageNumber"]"#;

const PRODUCT_NAME: [&str; 3] = [
    "#cm_cr_dp_d_product_info h1 a",
    "#cm_cr_dp_d_product_info h1",
    r#"[data-hook="product-link"]"#,
];
const TITLE: [&str; 2] = [r#"[data-hook="review-title"] span:not([class])"#, r#"[data-hook="review-title"]"#];
const RATING: [&str; 2] = [r#"[data-hook="review-star-rating"] span"#, r#"[data-hook="review-star-rating"]"#];
const AUTHOR: [&str; 2] = [".a-profile-name", "div:nth-child(3) > a > div.a-profile-content > span"];
const AUTHOR_LINK: [&str; 2] = ["a.a-profile", "div:nth-child(3) > a"];
const BODY: [&str; 2] = [r#"[data-hook="review-body"] span"#, r#"[data-hook="review-body"]"#];
const VARIATION: [&str; 3] = [
    r#"[data-hook="format-strip"]"#,
    r#"[data-hook="review-format-strip"]"#,
    ".review-format-strip",
];

/// How a review page can be advanced, in the order they are tried
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMethod {
    /// Enabled "Next page" control
    NextButton,
    /// Explicit link whose text is the target page number
    PageLink,
    /// Review pagination form with a `pageNumber` field
    PaginationForm,
}

/// Pagination-relevant state of a review-listing page, cheap enough to poll
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageProbe {
    /// Page number shown as selected in the pagination bar
    pub page_indicator: Option<u32>,
    /// Identifier of the first review block on the page
    pub first_review_id: Option<String>,
    pub review_count: usize,
    /// Whether an enabled next-page control is present
    pub has_next: bool,
}

/// Reviews and pagination state scraped from one listing page
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPage {
    /// Page number the reviews are attributed to: the indicator if shown, else the expected page
    pub page: u32,
    pub product_name: String,
    pub reviews: Vec<ReviewRecord>,
    pub probe: PageProbe,
}

/// Leading integer of `text`, the way the pagination bar labels pages
fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn review_id(block: ElementRef<'_>, page: u32, offset: usize) -> String {
    block
        .value()
        .attr("id")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("review-{}-{}", page, offset))
}

/// Resolve `href` against the page URL, falling back to the raw attribute
fn resolve_link(base_url: &str, href: &str) -> String {
    Url::parse(base_url)
        .and_then(|base| base.join(href))
        .or_else(|_| Url::parse(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

fn or_sentinel(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Probe the pagination state without extracting review fields
pub fn probe_page(document: &Html) -> PageProbe {
    let root = document.root_element();
    let page_indicator = select_first(root, PAGE_INDICATOR).and_then(|el| leading_number(&text_content(el)));
    let blocks = select_all(root, REVIEW_BLOCK);

    PageProbe {
        page_indicator,
        first_review_id: blocks
            .first()
            .map(|block| review_id(*block, page_indicator.unwrap_or(1), 0)),
        review_count: blocks.len(),
        has_next: first_match(root, &NEXT_CONTROLS).is_some(),
    }
}

/// The first navigation mechanism that applies for reaching `target_page`
pub fn navigation_method(document: &Html, target_page: u32) -> Option<NavigationMethod> {
    let root = document.root_element();

    if select_first(root, NEXT_CONTROLS[0]).is_some() {
        return Some(NavigationMethod::NextButton);
    }

    let target = target_page.to_string();
    if select_all(root, PAGE_LINKS)
        .into_iter()
        .any(|link| text_content(link).trim() == target)
    {
        return Some(NavigationMethod::PageLink);
    }

    select_first(root, PAGINATION_FORM)
        .and_then(|form| select_first(form, PAGE_NUMBER_INPUT))
        .map(|_| NavigationMethod::PaginationForm)
}

/// Extract a single review block
pub fn extract_review(block: ElementRef<'_>, page: u32, offset: usize, base_url: &str) -> ReviewRecord {
    let mut review = ReviewRecord::empty(review_id(block, page, offset), page);

    review.title = or_sentinel(first_text(block, &TITLE));
    review.rating = or_sentinel(first_text(block, &RATING));
    review.author = or_sentinel(first_text(block, &AUTHOR));
    review.author_profile_link = or_sentinel(
        first_match(block, &AUTHOR_LINK)
            .and_then(|a| a.value().attr("href"))
            .filter(|href| !href.is_empty())
            .map(|href| resolve_link(base_url, href)),
    );
    review.date = or_sentinel(first_text(block, &[r#"[data-hook="review-date"]"#]));
    review.text = or_sentinel(first_text(block, &BODY));
    review.helpful = or_sentinel(first_text(block, &[r#"[data-hook="helpful-vote-statement"]"#]));
    review.verified = select_first(block, r#"[data-hook="avp-badge"]"#).is_some();
    review.product_variation = or_sentinel(first_text(block, &VARIATION));
    review.images = select_all(block, r#"img[data-hook="review-image-tile"]"#)
        .into_iter()
        .filter_map(|img| img.value().attr("src"))
        .map(|src| resolve_link(base_url, src))
        .collect();
    review.is_vine_review = select_all(block, "span.a-color-success.a-text-bold")
        .into_iter()
        .any(|span| text_content(span).contains("Amazon Vine"));

    review
}

/// Scrape every review block on a listing page.
///
/// `expected_page` is used when the pagination bar has no selected indicator.
/// `base_url` resolves relative profile and image links.
pub fn scrape_review_page(document: &Html, expected_page: u32, base_url: &str) -> ReviewPage {
    let root = document.root_element();
    let probe = probe_page(document);
    let page = probe.page_indicator.unwrap_or(expected_page);

    if probe.page_indicator.is_some_and(|shown| shown != expected_page) {
        log::warn!("Expected review page {} but the indicator shows {}", expected_page, page);
    }

    let product_name = first_match(root, &PRODUCT_NAME)
        .and_then(trimmed_text)
        .unwrap_or_else(|| PRODUCT_NAME_NOT_FOUND.to_string());

    let reviews: Vec<ReviewRecord> = select_all(root, REVIEW_BLOCK)
        .into_iter()
        .enumerate()
        .map(|(offset, block)| extract_review(block, page, offset, base_url))
        .collect();

    log::debug!("Scraped {} reviews from page {}", reviews.len(), page);

    ReviewPage {
        page,
        product_name,
        reviews,
        probe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.amazon.com/product-reviews/B000TEST01/ref=cm_cr_dp_d_show_all_btm";

    fn listing(reviews: &str, pagination: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body>
                <div id="cm_cr_dp_d_product_info"><h1><a href="/dp/B000TEST01"> Acme Mug </a></h1></div>
                <div id="cm_cr-review_list">{}</div>
                {}
            </body></html>"#,
            reviews, pagination
        ))
    }

    const FULL_REVIEW: &str = r#"
        <div id="R1ABC" data-hook="review">
            <div class="a-row"><a class="a-profile" href="/gp/profile/amzn1.account.X">
                <div class="a-profile-content"><span class="a-profile-name">Jane D.</span></div></a></div>
            <a data-hook="review-title"><i data-hook="review-star-rating"><span class="a-icon-alt">5.0 out of 5 stars</span></i>
                <span class="a-letter-space"></span><span>Great mug</span></a>
            <span data-hook="review-date">Reviewed in the United States on May 2, 2024</span>
            <a data-hook="format-strip">Color: Blue</a>
            <span data-hook="avp-badge">Verified Purchase</span>
            <span data-hook="review-body"><span>Keeps coffee hot, "really" hot.</span></span>
            <img data-hook="review-image-tile" src="https://m.media-amazon.com/images/I/a._SY88.jpg">
            <span data-hook="helpful-vote-statement">12 people found this helpful</span>
            <span class="a-color-success a-text-bold">Amazon Vine Customer Review of Free Product</span>
        </div>"#;

    #[test]
    fn test_full_review_fields() {
        let doc = listing(FULL_REVIEW, "");
        let page = scrape_review_page(&doc, 1, BASE);

        assert_eq!(page.product_name, "Acme Mug");
        assert_eq!(page.reviews.len(), 1);

        let r = &page.reviews[0];
        assert_eq!(r.id, "R1ABC");
        assert_eq!(r.page, 1);
        assert_eq!(r.title, "Great mug");
        assert_eq!(r.rating, "5.0 out of 5 stars");
        assert_eq!(r.author, "Jane D.");
        assert_eq!(r.author_profile_link, "https://www.amazon.com/gp/profile/amzn1.account.X");
        assert_eq!(r.date, "Reviewed in the United States on May 2, 2024");
        assert_eq!(r.product_variation, "Color: Blue");
        assert!(r.verified);
        assert_eq!(r.text, r#"Keeps coffee hot, "really" hot."#);
        assert_eq!(r.images, vec!["https://m.media-amazon.com/images/I/a._SY88.jpg".to_string()]);
        assert_eq!(r.helpful, "12 people found this helpful");
        assert!(r.is_vine_review);
    }

    #[test]
    fn test_missing_fields_use_sentinels() {
        let doc = listing(r#"<div data-hook="review"></div>"#, "");
        let page = scrape_review_page(&doc, 3, BASE);

        let r = &page.reviews[0];
        assert_eq!(r.id, "review-3-0");
        assert_eq!(r.title, NOT_AVAILABLE);
        assert_eq!(r.rating, NOT_AVAILABLE);
        assert_eq!(r.author, NOT_AVAILABLE);
        assert_eq!(r.author_profile_link, NOT_AVAILABLE);
        assert_eq!(r.date, NOT_AVAILABLE);
        assert_eq!(r.text, NOT_AVAILABLE);
        assert_eq!(r.helpful, NOT_AVAILABLE);
        assert_eq!(r.product_variation, NOT_AVAILABLE);
        assert!(!r.verified);
        assert!(r.images.is_empty());
        assert!(!r.is_vine_review);
    }

    #[test]
    fn test_synthesized_ids_are_unique_across_pages() {
        let doc = listing(r#"<div data-hook="review"></div><div data-hook="review"></div>"#, "");
        let first = scrape_review_page(&doc, 1, BASE);
        let second = scrape_review_page(&doc, 2, BASE);

        let ids: Vec<_> = first.reviews.iter().chain(&second.reviews).map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["review-1-0", "review-1-1", "review-2-0", "review-2-1"]);
    }

    #[test]
    fn test_product_name_fallback() {
        let doc = Html::parse_document(r#"<div data-hook="review" id="R1"></div>"#);
        assert_eq!(scrape_review_page(&doc, 1, BASE).product_name, PRODUCT_NAME_NOT_FOUND);

        let doc = Html::parse_document(r#"<a data-hook="product-link">Linked Name</a>"#);
        assert_eq!(scrape_review_page(&doc, 1, BASE).product_name, "Linked Name");
    }

    #[test]
    fn test_page_indicator_overrides_expected_page() {
        let pagination = r#"<ul class="a-pagination"><li class="a-selected"><a>4</a></li></ul>"#;
        let doc = listing(r#"<div data-hook="review"></div>"#, pagination);

        let page = scrape_review_page(&doc, 3, BASE);
        assert_eq!(page.page, 4);
        assert_eq!(page.reviews[0].id, "review-4-0");
    }

    #[test]
    fn test_probe() {
        let pagination = r#"<ul class="a-pagination">
            <li class="a-selected"><a>2</a></li>
            <li class="a-last"><a href="?pageNumber=3">Next page</a></li></ul>"#;
        let doc = listing(r#"<div id="R9" data-hook="review"></div><div id="R10" data-hook="review"></div>"#, pagination);

        let probe = probe_page(&doc);
        assert_eq!(probe.page_indicator, Some(2));
        assert_eq!(probe.first_review_id.as_deref(), Some("R9"));
        assert_eq!(probe.review_count, 2);
        assert!(probe.has_next);
    }

    #[test]
    fn test_disabled_next_is_not_next() {
        let pagination = r#"<ul class="a-pagination">
            <li class="a-selected"><a>5</a></li>
            <li class="a-disabled a-last">Next page</li></ul>"#;
        let doc = listing("", pagination);

        let probe = probe_page(&doc);
        assert!(!probe.has_next);
        assert_eq!(probe.review_count, 0);
        assert!(probe.first_review_id.is_none());
        assert_eq!(navigation_method(&doc, 6), None);
    }

    #[test]
    fn test_navigation_method_priority() {
        let next = listing("", r#"<ul class="a-pagination"><li><a>3</a></li><li class="a-last"><a>Next</a></li></ul>"#);
        assert_eq!(navigation_method(&next, 3), Some(NavigationMethod::NextButton));

        let link = listing("", r#"<ul class="a-pagination"><li class="a-selected"><a>2</a></li><li><a> 3 </a></li></ul>"#);
        assert_eq!(navigation_method(&link, 3), Some(NavigationMethod::PageLink));
        assert_eq!(navigation_method(&link, 4), None);

        let form = listing(
            "",
            r#"<form action="/product-reviews/B000TEST01"><input name="pageNumber" value="1"></form>"#,
        );
        assert_eq!(navigation_method(&form, 2), Some(NavigationMethod::PaginationForm));
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number(" 12 "), Some(12));
        assert_eq!(leading_number("3rd"), Some(3));
        assert_eq!(leading_number("Next"), None);
    }
}
