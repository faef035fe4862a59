//! Loader system for retrieving referenced resources
//!
//! Design: each loader handles one family of locations (filesystem paths,
//! http(s) URLs). LoaderRegistry dispatches to the first matching loader.

mod file;
mod http;

pub use file::FileLoader;
pub use http::HttpLoader;

use crate::client::InlineOptions;
use crate::error::InlineError;
use crate::location::Location;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

/// Fallback MIME type for data URIs
const DEFAULT_MIME: &str = "application/octet-stream";

/// UTF-8 byte order mark
const BOM: &str = "\u{feff}";

/// Bytes of one loaded resource
#[derive(Debug, Clone)]
pub struct Resource {
    /// Where the bytes came from
    pub location: Location,
    pub bytes: Bytes,
    /// Content-Type reported by the source, if any
    pub content_type: Option<String>,
}

impl Resource {
    /// Content decoded as UTF-8, lossily, without a leading BOM
    pub fn text(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        text.strip_prefix(BOM).unwrap_or(text.as_ref()).to_string()
    }

    /// MIME type without parameters
    ///
    /// Prefers the reported Content-Type, then the file extension.
    pub fn mime_type(&self) -> String {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map(str::to_string)
            .or_else(|| self.location.guess_mime().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MIME.to_string())
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for resource loaders
///
/// Implement this trait to serve resources from somewhere other than the
/// filesystem or plain HTTP, e.g. an in-memory asset bundle. Each loader
/// declares what locations it can handle via `matches()` and performs the
/// actual read via `load()`.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Unique identifier for this loader (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Returns true if this loader can handle the given location
    fn matches(&self, location: &Location) -> bool;

    /// Load the resource
    ///
    /// Called only if `matches()` returned true.
    async fn load(
        &self,
        location: &Location,
        options: &InlineOptions,
    ) -> Result<Resource, InlineError>;
}

/// Registry of loaders that dispatches to the appropriate handler
///
/// Maintains an ordered list of loaders. When loading a location, iterates
/// through loaders and uses the first one that matches.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn Loader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LoaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Create a registry with the built-in loaders
    ///
    /// 1. HttpLoader - http(s) URLs
    /// 2. FileLoader - filesystem paths
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for loader in Self::default_loaders() {
            registry.register(loader);
        }
        registry
    }

    /// The built-in loaders, in priority order
    pub fn default_loaders() -> Vec<Box<dyn Loader>> {
        vec![Box::new(HttpLoader::new()), Box::new(FileLoader::new())]
    }

    /// Register a loader
    ///
    /// Loaders are checked in registration order.
    pub fn register(&mut self, loader: Box<dyn Loader>) {
        self.loaders.push(loader);
    }

    /// Load a location using the first matching loader
    pub async fn load(
        &self,
        location: &Location,
        options: &InlineOptions,
    ) -> Result<Resource, InlineError> {
        for loader in &self.loaders {
            if loader.matches(location) {
                tracing::debug!(loader = loader.name(), location = %location, "Using loader");
                return loader.load(location, options).await;
            }
        }

        Err(InlineError::UnsupportedLocation(location.to_string()))
    }
}
