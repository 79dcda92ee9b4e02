// Cover art references come from three places (REST API, external uploads,
// inline data URIs) and are not always well-formed.

use tracing::{debug, warn};

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.jpg";

pub fn is_data_uri(value: &str) -> bool {
    value.starts_with("data:image/") || (value.starts_with("data:") && value.contains(";base64,"))
}

/// Normalize a cover-art reference into something displayable.
///
/// Data URIs, http(s) URLs and absolute paths are kept. A bare host/path
/// without a scheme gets `https://`. Anything else becomes the placeholder.
pub fn normalize_image_url(url: Option<&str>) -> Option<String> {
    let url = url?.trim();
    if url.is_empty() {
        return None;
    }

    if is_data_uri(url) {
        return Some(url.to_string());
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Some(url.to_string());
    }
    if url.starts_with('/') {
        return Some(url.to_string());
    }
    if !url.contains("://") && !url.starts_with("data:") {
        debug!("Adding https:// to image URL: {}", url);
        return Some(format!("https://{}", url));
    }

    warn!("Invalid image URL format: {}", url);
    Some(PLACEHOLDER_IMAGE.to_string())
}
