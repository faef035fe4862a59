//! Entry points for InlineKit
//!
//! This module provides request-shaped entry points for inlining a document.
//! The orchestration itself lives in [`Inliner`](crate::Inliner).

use crate::inliner::Inliner;
use crate::types::{ImagePolicy, InlineOutput, InlineRequest};
use crate::DEFAULT_INLINE_ATTRIBUTE;
use std::time::Duration;

/// Inline options that can be configured via the inliner builder
#[derive(Debug, Clone)]
pub struct InlineOptions {
    /// Policy for `<img>` and CSS `url()` references
    pub images: ImagePolicy,
    /// Surface fetch failures as an error
    pub strict: bool,
    /// Inline `<script src>` tags
    pub scripts: bool,
    /// Inline `<link rel="stylesheet">` tags
    pub links: bool,
    /// Opt-in marker name; `-ignore` and `-size` variants derive from it
    pub inline_attribute: String,
    /// Custom User-Agent
    pub user_agent: Option<String>,
    /// Transport timeout for remote resources
    pub timeout: Option<Duration>,
}

impl Default for InlineOptions {
    fn default() -> Self {
        Self {
            images: ImagePolicy::default(),
            strict: false,
            scripts: true,
            links: true,
            inline_attribute: DEFAULT_INLINE_ATTRIBUTE.to_string(),
            user_agent: None,
            timeout: None,
        }
    }
}

impl From<&InlineRequest> for InlineOptions {
    fn from(req: &InlineRequest) -> Self {
        Self {
            images: req.images,
            strict: req.strict,
            scripts: req.scripts.unwrap_or(true),
            links: req.links.unwrap_or(true),
            ..Default::default()
        }
    }
}

/// Inline stylesheets, scripts and images referenced by an HTML document
///
/// Uses the default loaders and warning sink. For custom configuration,
/// use [`Inliner::builder`].
pub async fn inline_html(req: InlineRequest) -> InlineOutput {
    let inliner = Inliner::with_options(InlineOptions::from(&req));
    inliner.html(&req.file_content, &req.relative_to).await
}

/// Inline `url()` references of a CSS document
pub async fn inline_css(req: InlineRequest) -> InlineOutput {
    let inliner = Inliner::with_options(InlineOptions::from(&req));
    inliner.css(&req.file_content, &req.relative_to).await
}
