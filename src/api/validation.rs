use thiserror::Error;

use super::models::{BatchRequest, UrlRequest};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("Missing \"url\" in request body")]
    MissingUrl,
    #[error("Missing \"urls\" array in request body")]
    MissingUrls,
    #[error("\"urls\" entry {0} is empty")]
    EmptyBatchEntry(usize),
}

/// The trimmed URL of a single-URL request
pub fn validate_url(request: &UrlRequest) -> Result<String, RequestValidationError> {
    request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_owned)
        .ok_or(RequestValidationError::MissingUrl)
}

/// The trimmed URLs of a batch request, order preserved
pub fn validate_urls(request: &BatchRequest) -> Result<Vec<String>, RequestValidationError> {
    let urls = request
        .urls
        .as_ref()
        .filter(|urls| !urls.is_empty())
        .ok_or(RequestValidationError::MissingUrls)?;

    urls.iter()
        .enumerate()
        .map(|(idx, url)| {
            let url = url.trim();
            if url.is_empty() {
                Err(RequestValidationError::EmptyBatchEntry(idx))
            } else {
                Ok(url.to_string())
            }
        })
        .collect()
}
