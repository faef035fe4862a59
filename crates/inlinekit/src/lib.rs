//! InlineKit - inline external resources into HTML and CSS documents
//!
//! Replaces stylesheet links, script sources, images and CSS `url()`
//! references with the content they point at: raw text for stylesheets and
//! scripts, base64 data URIs for images and other binary assets. Resources
//! may live on disk (relative to a base directory) or behind http(s) URLs.
//!
//! ```no_run
//! use inlinekit::{inline_html, InlineRequest};
//!
//! # async fn run() {
//! let html = r#"<link rel="stylesheet" href="style.css"><img src="logo.png">"#;
//! let output = inline_html(InlineRequest::new(html, "site/").images(8.0)).await;
//! println!("{}", output.text);
//! # }
//! ```
//!
//! ## Loader System
//!
//! Resources are read through pluggable loaders. The [`LoaderRegistry`]
//! dispatches each resolved location to the first loader that accepts it.
//!
//! Built-in loaders:
//! - [`HttpLoader`] - http/https URLs, including protocol-relative references
//! - [`FileLoader`] - filesystem paths relative to the base directory

pub mod client;
mod diagnostics;
mod error;
mod escape;
mod extract;
mod inliner;
pub mod loaders;
mod location;
mod policy;
mod types;

pub use client::{inline_css, inline_html, InlineOptions};
pub use diagnostics::{CollectingSink, TracingSink, WarningSink};
pub use error::{AggregateError, ErrorKind, InlineError, ResourceFailure};
pub use escape::escape_special_chars;
pub use extract::Extractor;
pub use inliner::{Inliner, InlinerBuilder};
pub use loaders::{FileLoader, HttpLoader, Loader, LoaderRegistry, Resource};
pub use location::Location;
pub use policy::{fits_threshold, should_inline};
pub use types::{
    Attribute, ImagePolicy, InlineOutput, InlineRequest, Marker, ReferenceKind, ReferenceMatch,
};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = concat!("InlineKit/", env!("CARGO_PKG_VERSION"));

/// Default opt-in marker attribute
pub const DEFAULT_INLINE_ATTRIBUTE: &str = "data-inline";
