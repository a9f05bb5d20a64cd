//! HTML parser for recommendation links and gallery images
//!
//! Parsing is synchronous and returns owned data, so no parsed document
//! outlives the call (scraper's `Html` is not `Send`).

use scraper::{ElementRef, Html, Selector};

/// Container of a single recommendation link
const RECOMMENDATION_SELECTOR: &str = ".recommentBox";

/// Thumbnail elements inside the gallery body
const IMAGE_SELECTOR: &str = ".rootContant .showMiniImage";

/// Attribute holding the lazily loaded thumbnail source
const IMAGE_SOURCE_ATTR: &str = "data-src";

/// A related page found on the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    /// Link target as written in the page
    pub url: String,
    /// Link title (or text); names the image directory
    pub label: String,
}

/// Extracts recommendation links in document order
///
/// Each `.recommentBox` contributes its first `<a>`: `href` becomes the url,
/// `title` the label, falling back to the anchor text. Boxes without an
/// href or a label are skipped.
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::extract_recommendations;
///
/// let html = r#"<div class="recommentBox"><a href="/p/2" title="Second">2</a></div>"#;
/// let found = extract_recommendations(html);
/// assert_eq!(found[0].url, "/p/2");
/// assert_eq!(found[0].label, "Second");
/// ```
pub fn extract_recommendations(html: &str) -> Vec<Recommendation> {
    let document = Html::parse_document(html);

    let (Ok(box_selector), Ok(anchor_selector)) =
        (Selector::parse(RECOMMENDATION_SELECTOR), Selector::parse("a"))
    else {
        return Vec::new();
    };

    document
        .select(&box_selector)
        .filter_map(|element| element.select(&anchor_selector).next())
        .filter_map(to_recommendation)
        .collect()
}

fn to_recommendation(anchor: ElementRef<'_>) -> Option<Recommendation> {
    let url = anchor.value().attr("href")?.trim();
    if url.is_empty() {
        return None;
    }

    let label = match anchor.value().attr("title").map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => anchor.text().collect::<String>().trim().to_string(),
    };
    if label.is_empty() {
        return None;
    }

    Some(Recommendation {
        url: url.to_string(),
        label,
    })
}

/// Extracts thumbnail sources of the gallery images in document order
///
/// Elements without a `data-src` attribute are skipped.
pub fn extract_image_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse(IMAGE_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr(IMAGE_SOURCE_ATTR))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
        .collect()
}
