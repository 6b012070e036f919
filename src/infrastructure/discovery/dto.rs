use serde::Deserialize;

use crate::domain::entities::{AspectRatio, ImageRecord};

/// One entry of the listing endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    /// Service-side ID; falls back to `src` when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Image address.
    pub src: String,
    /// Original file name.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Layout hint.
    #[serde(default)]
    pub ratio: Option<AspectRatio>,
}

impl ListingEntry {
    /// Converts into a domain record, resolving `src` against `base_url`.
    #[must_use]
    pub fn into_record(self, base_url: &str) -> ImageRecord {
        let src = resolve_src(base_url, &self.src);
        let id = self.id.unwrap_or_else(|| src.clone());
        ImageRecord::new(id, src, self.file_name, self.ratio.unwrap_or_default())
    }
}

/// Count endpoint response.
#[derive(Debug, Deserialize)]
pub struct CountResponse {
    /// Estimated population size.
    pub count: u64,
}

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    pub message: String,
}

fn resolve_src(base_url: &str, src: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        src.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            src.trim_start_matches('/')
        )
    }
}
