//! HTTP loader
//!
//! Handles http/https locations with a plain GET. Non-success statuses are
//! reported as errors; timeouts are whatever the caller configured on the
//! transport.

use crate::client::InlineOptions;
use crate::error::InlineError;
use crate::loaders::{Loader, Resource};
use crate::location::Location;
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

/// HTTP(S) loader
pub struct HttpLoader;

impl HttpLoader {
    /// Create a new HTTP loader
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Loader for HttpLoader {
    fn name(&self) -> &'static str {
        "http"
    }

    fn matches(&self, location: &Location) -> bool {
        matches!(location, Location::Remote(url) if matches!(url.scheme(), "http" | "https"))
    }

    async fn load(
        &self,
        location: &Location,
        options: &InlineOptions,
    ) -> Result<Resource, InlineError> {
        let Location::Remote(url) = location else {
            return Err(InlineError::UnsupportedLocation(location.to_string()));
        };

        // Build headers
        let mut headers = HeaderMap::new();
        let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        // Build client
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.connect_timeout(timeout).timeout(timeout);
        }
        let client = builder.build().map_err(InlineError::ClientBuildError)?;

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(InlineError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(InlineError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(InlineError::from_reqwest)?;
        debug!(url = %url, size = bytes.len(), "Fetched remote resource");

        Ok(Resource {
            location: location.clone(),
            bytes,
            content_type,
        })
    }
}
