use url::Url;

const KNOWN_SCHEMES: [&str; 5] = ["http", "https", "file", "data", "about"];

/// Complete a URL typed without a scheme (`www.amazon.de/dp/...` gets `https://`).
/// A bare marketplace name becomes its `.com` site (`amazon` -> `https://www.amazon.com`).
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();

    let has_scheme = Url::parse(trimmed).is_ok_and(|parsed| KNOWN_SCHEMES.contains(&parsed.scheme()));
    if has_scheme {
        return trimmed.to_string();
    }

    if !trimmed.contains(['.', '/']) {
        return format!("https://www.{}.com", trimmed.to_lowercase());
    }

    format!("https://{}", trimmed)
}

/// `Some(url)` normalized, or `None` for a missing or blank value
pub fn optional_url(url: Option<&str>) -> Option<String> {
    url.map(str::trim).filter(|u| !u.is_empty()).map(normalize_url)
}
