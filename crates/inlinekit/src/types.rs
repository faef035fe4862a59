//! Core types for InlineKit

use crate::error::AggregateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Inline policy for images and CSS `url()` references
///
/// Deserializes from `false`, `true` or a number of kilobytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImagePolicy {
    /// `false` (default) / `true`
    Enabled(bool),
    /// Inline only images up to this many kilobytes
    MaxKb(f64),
}

impl Default for ImagePolicy {
    fn default() -> Self {
        ImagePolicy::Enabled(false)
    }
}

impl ImagePolicy {
    /// Size threshold in kilobytes, if this is a numeric policy
    pub fn threshold_kb(&self) -> Option<f64> {
        match self {
            ImagePolicy::MaxKb(kb) => Some(*kb),
            ImagePolicy::Enabled(_) => None,
        }
    }
}

impl From<bool> for ImagePolicy {
    fn from(enabled: bool) -> Self {
        ImagePolicy::Enabled(enabled)
    }
}

impl From<f64> for ImagePolicy {
    fn from(kb: f64) -> Self {
        ImagePolicy::MaxKb(kb)
    }
}

impl std::str::FromStr for ImagePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "on" | "yes" => Ok(ImagePolicy::Enabled(true)),
            "false" | "off" | "no" => Ok(ImagePolicy::Enabled(false)),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|kb| kb.is_finite() && *kb >= 0.0)
                .map(ImagePolicy::MaxKb)
                .ok_or_else(|| {
                    format!("Invalid images policy: {other} (expected true, false or KB)")
                }),
        }
    }
}

/// Request to inline one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InlineRequest {
    /// Document text
    pub file_content: String,

    /// Base path or URL that relative references resolve against
    pub relative_to: String,

    /// Image policy (default false)
    #[serde(default)]
    pub images: ImagePolicy,

    /// Surface fetch failures as an error (default false)
    #[serde(default)]
    pub strict: bool,

    /// Inline `<script src>` tags (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<bool>,

    /// Inline `<link rel="stylesheet">` tags (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<bool>,
}

impl InlineRequest {
    /// Create a new request for the given document and base location
    pub fn new(file_content: impl Into<String>, relative_to: impl Into<String>) -> Self {
        Self {
            file_content: file_content.into(),
            relative_to: relative_to.into(),
            ..Default::default()
        }
    }

    /// Set the image policy
    pub fn images(mut self, images: impl Into<ImagePolicy>) -> Self {
        self.images = images.into();
        self
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Toggle script inlining
    pub fn scripts(mut self, enabled: bool) -> Self {
        self.scripts = Some(enabled);
        self
    }

    /// Toggle stylesheet inlining
    pub fn links(mut self, enabled: bool) -> Self {
        self.links = Some(enabled);
        self
    }
}

/// Result of one inlining call
///
/// `text` is always the best-effort document. `error` is only set in
/// strict mode when at least one approved reference failed.
#[derive(Debug)]
pub struct InlineOutput {
    pub text: String,
    pub error: Option<AggregateError>,
}

impl InlineOutput {
    /// Discard the text on failure
    pub fn into_result(self) -> Result<String, AggregateError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.text),
        }
    }
}

/// Construct carrying a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `<link rel="stylesheet" href>`
    Stylesheet,
    /// `<script src>`
    Script,
    /// `<img src>`
    Image,
    /// CSS `url(...)`
    CssUrl,
}

impl ReferenceKind {
    /// Whether the resource is embedded as a data URI rather than as text
    pub fn is_binary(&self) -> bool {
        matches!(self, ReferenceKind::Image | ReferenceKind::CssUrl)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Stylesheet => write!(f, "stylesheet"),
            ReferenceKind::Script => write!(f, "script"),
            ReferenceKind::Image => write!(f, "image"),
            ReferenceKind::CssUrl => write!(f, "css url"),
        }
    }
}

/// Explicit per-reference override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Opt-in (`data-inline`)
    Include,
    /// Opt-out (`data-inline-ignore`)
    Exclude,
}

/// Attribute parsed from a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased name
    pub name: String,
    pub value: Option<String>,
    /// Attribute text as written, e.g. `defer` or `media="print"`
    pub raw: String,
}

/// One inlineable reference found in a document
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatch {
    /// Exact matched text
    pub raw: String,
    /// Byte range of `raw` in the document
    pub span: Range<usize>,
    /// Path or URL as written
    pub reference: String,
    /// Byte range of `reference` inside `raw`
    pub reference_span: Range<usize>,
    pub kind: ReferenceKind,
    /// Declared size in kilobytes
    pub size_hint_kb: Option<f64>,
    pub marker: Option<Marker>,
    /// Tag attributes (empty for CSS `url()`)
    pub attributes: Vec<Attribute>,
}

impl ReferenceMatch {
    /// `raw` with the reference replaced by `replacement`
    pub fn with_reference(&self, replacement: &str) -> String {
        let mut out = String::with_capacity(self.raw.len() + replacement.len());
        out.push_str(&self.raw[..self.reference_span.start]);
        out.push_str(replacement);
        out.push_str(&self.raw[self.reference_span.end..]);
        out
    }
}
