use url::Url;

/// Marker the site puts before the extension of thumbnail images
const THUMBNAIL_MARKER: &str = "_t.";

/// Extension used when an image path carries none
const FALLBACK_EXTENSION: &str = "bin";

/// Rewrites a thumbnail source into the full-size image source
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::full_size_image_url;
///
/// assert_eq!(full_size_image_url("/img/123_t.jpg"), "/img/123.jpg");
/// assert_eq!(full_size_image_url("/img/123.jpg"), "/img/123.jpg");
/// ```
pub fn full_size_image_url(src: &str) -> String {
    src.replace(THUMBNAIL_MARKER, ".")
}

/// Returns the file extension of an image source, without the dot
///
/// Query strings and fragments are ignored. Sources without a usable
/// extension get `bin`.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::image_extension;
///
/// assert_eq!(image_extension("/img/123.jpg"), "jpg");
/// assert_eq!(image_extension("https://cdn.example.com/a/b.png?w=200"), "png");
/// assert_eq!(image_extension("/img/raw"), "bin");
/// ```
pub fn image_extension(src: &str) -> String {
    let path = match Url::parse(src) {
        Ok(url) => url.path().to_string(),
        Err(_) => src.split(|c: char| c == '?' || c == '#').next().unwrap_or_default().to_string(),
    };

    let file_name = path.rsplit('/').next().unwrap_or_default();

    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            ext.to_string()
        }
        _ => FALLBACK_EXTENSION.to_string(),
    }
}
