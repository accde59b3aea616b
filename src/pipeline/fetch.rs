//! Document retrieval: download the bytes behind a presigned URL.
//!
//! The locator carries its own authorisation (a pre-signed S3 URL), so the
//! fetch is a plain GET. There is exactly one attempt; a failure ends the
//! request. No content-type or magic-byte check is made here: whether the
//! bytes are a PDF is pdfium's call.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Strip the query string (and with it any signature) for logging.
pub fn redact_locator(locator: &str) -> &str {
    locator.split(['?', '#']).next().unwrap_or(locator)
}

/// HTTP fetcher shared by all requests.
///
/// Cloning is cheap: `reqwest::Client` is an `Arc` around its connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: Option<u64>,
}

impl Fetcher {
    /// Build a fetcher from the service configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .user_agent(concat!("paperjet-ml/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.download_timeout_secs,
            max_bytes: config.max_document_bytes,
        })
    }

    /// Download the document at `locator` into memory.
    pub async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ServiceError> {
        let locator = locator.trim();
        if !is_url(locator) || reqwest::Url::parse(locator).is_err() {
            return Err(ServiceError::InvalidLocator {
                locator: redact_locator(locator).to_string(),
            });
        }

        info!("Downloading document from: {}", redact_locator(locator));

        let mut response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(ServiceError::DownloadFailed {
                reason: format!("HTTP {}", response.status()),
            });
        }

        let declared = response.content_length();
        if let (Some(max), Some(len)) = (self.max_bytes, declared) {
            if len > max {
                return Err(ServiceError::DocumentTooLarge { size: len, max });
            }
        }

        // Chunked bodies carry no length up front, so the cap is enforced
        // while reading and never more than `max` bytes are buffered.
        let capacity = match (declared, self.max_bytes) {
            (Some(len), Some(max)) => len.min(max),
            (Some(len), None) => len,
            (None, _) => 0,
        };
        let mut body = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e))? {
            let received = (body.len() + chunk.len()) as u64;
            if let Some(max) = self.max_bytes {
                if received > max {
                    return Err(ServiceError::DocumentTooLarge {
                        size: received,
                        max,
                    });
                }
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes", body.len());
        Ok(body)
    }

    fn transport_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::DownloadTimeout {
                secs: self.timeout_secs,
            }
        } else {
            // reqwest includes the full URL in its Display; drop it.
            ServiceError::DownloadFailed {
                reason: e.without_url().to_string(),
            }
        }
    }
}
