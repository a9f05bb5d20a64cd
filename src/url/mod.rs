//! URL handling module for Sumi-Harvest
//!
//! Pages and images are referenced by site-relative paths. This module turns
//! them into fetchable URLs and derives image names from them.

mod normalize;

pub use normalize::{full_size_image_url, image_extension};

use url::Url;

/// Returns true if `href` is already an absolute http(s) URL
pub fn is_absolute(href: &str) -> bool {
    Url::parse(href)
        .map(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or(false)
}

/// Builds the URL to fetch for a page or image path
///
/// Relative paths are appended to `base_url` as-is (the base may carry a
/// path prefix, which a standard URL join would drop). Exactly one slash
/// separates the two parts. Absolute http(s) URLs are returned unchanged.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::resolve;
///
/// assert_eq!(resolve("https://example.com", "/a/1"), "https://example.com/a/1");
/// assert_eq!(resolve("https://example.com/", "/a/1"), "https://example.com/a/1");
/// assert_eq!(resolve("https://example.com", "https://cdn.example.com/x.jpg"), "https://cdn.example.com/x.jpg");
/// ```
pub fn resolve(base_url: &str, path: &str) -> String {
    if is_absolute(path) {
        return path.to_string();
    }

    match (base_url.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base_url, &path[1..]),
        (false, false) => format!("{}/{}", base_url, path),
        _ => format!("{}{}", base_url, path),
    }
}
