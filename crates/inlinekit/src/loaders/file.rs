//! Filesystem loader

use crate::client::InlineOptions;
use crate::error::InlineError;
use crate::loaders::{Loader, Resource};
use crate::location::Location;
use async_trait::async_trait;
use bytes::Bytes;

/// Reads local paths from disk
pub struct FileLoader;

impl FileLoader {
    /// Create a new file loader
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Loader for FileLoader {
    fn name(&self) -> &'static str {
        "file"
    }

    fn matches(&self, location: &Location) -> bool {
        matches!(location, Location::Local(_))
    }

    async fn load(
        &self,
        location: &Location,
        _options: &InlineOptions,
    ) -> Result<Resource, InlineError> {
        let Location::Local(path) = location else {
            return Err(InlineError::UnsupportedLocation(location.to_string()));
        };

        let bytes = tokio::fs::read(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                InlineError::FileNotFound { path: path.clone() }
            } else {
                InlineError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        Ok(Resource {
            location: location.clone(),
            bytes: Bytes::from(bytes),
            content_type: None,
        })
    }
}
