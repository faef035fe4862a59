//! Substitution orchestrator
//!
//! One pass over a document: extract references, filter them through the
//! inclusion policy, load every approved resource concurrently, wait for all
//! of them, then splice replacements back into the original text by byte
//! span. Failures never abort sibling loads; they are collected and either
//! returned (strict) or sent to the warning sink (lenient).

use crate::client::InlineOptions;
use crate::diagnostics::{TracingSink, WarningSink};
use crate::error::{AggregateError, InlineError, ResourceFailure};
use crate::extract::Extractor;
use crate::loaders::{Loader, LoaderRegistry, Resource};
use crate::location::{self, Location};
use crate::policy;
use crate::types::{ImagePolicy, InlineOutput, ReferenceKind, ReferenceMatch};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

/// Closing script tag inside script text
static SCRIPT_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(script)").unwrap());

/// Attributes dropped when a `<link>` becomes a `<style>`
const LINK_ONLY_ATTRIBUTES: &[&str] = &["href", "rel", "type"];

/// Attributes dropped when a `<script src>` gets inline content
const SCRIPT_ONLY_ATTRIBUTES: &[&str] = &["src"];

/// Builder for configuring an [`Inliner`]
#[derive(Default)]
pub struct InlinerBuilder {
    options: InlineOptions,
    loaders: Vec<Box<dyn Loader>>,
    warning_sink: Option<Arc<dyn WarningSink>>,
}

impl InlinerBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all options at once
    pub fn options(mut self, options: InlineOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the image policy
    pub fn images(mut self, images: impl Into<ImagePolicy>) -> Self {
        self.options.images = images.into();
        self
    }

    /// Surface failures as an error instead of warnings
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Inline `<script src>` tags
    pub fn scripts(mut self, enable: bool) -> Self {
        self.options.scripts = enable;
        self
    }

    /// Inline stylesheet links
    pub fn links(mut self, enable: bool) -> Self {
        self.options.links = enable;
        self
    }

    /// Set the marker attribute name
    pub fn inline_attribute(mut self, name: impl Into<String>) -> Self {
        self.options.inline_attribute = name.into();
        self
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.options.user_agent = Some(ua.into());
        self
    }

    /// Set transport timeout for remote resources
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Register a loader that takes priority over the built-in ones
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Send lenient-mode failures somewhere other than `tracing`
    pub fn warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warning_sink = Some(sink);
        self
    }

    /// Build the inliner
    pub fn build(self) -> Inliner {
        let mut registry = LoaderRegistry::new();
        for loader in self.loaders {
            registry.register(loader);
        }
        for loader in LoaderRegistry::default_loaders() {
            registry.register(loader);
        }

        Inliner {
            extractor: Extractor::new(&self.options.inline_attribute),
            options: self.options,
            loaders: registry,
            warning_sink: self.warning_sink.unwrap_or_else(|| Arc::new(TracingSink)),
        }
    }
}

/// Configured resource inliner
///
/// Holds no per-document state; one instance may serve any number of
/// concurrent calls.
pub struct Inliner {
    options: InlineOptions,
    extractor: Extractor,
    loaders: LoaderRegistry,
    warning_sink: Arc<dyn WarningSink>,
}

impl Default for Inliner {
    fn default() -> Self {
        InlinerBuilder::new().build()
    }
}

/// What references in one text resolve against
#[derive(Clone, Copy)]
struct Scope<'a> {
    /// Base location, or the `relative_to` value that could not be parsed
    base: Result<&'a Location, &'a str>,
    /// Stylesheet the text came from: href as written and resolved location
    stylesheet: Option<(&'a str, &'a Location)>,
}

impl Scope<'_> {
    fn resolve(&self, reference: &str) -> Result<Location, InlineError> {
        match self.base {
            Ok(base) => base.resolve(reference),
            Err(raw) => Err(InlineError::InvalidUrl(raw.to_string())),
        }
    }

    /// Reference rewritten to stay valid outside its stylesheet
    fn rebased(&self, m: &ReferenceMatch) -> Option<String> {
        let (href, stylesheet) = self.stylesheet?;
        location::rebase(&m.reference, href, stylesheet).map(|r| m.with_reference(&r))
    }
}

/// Result of processing one approved reference
struct Outcome {
    replacement: Option<String>,
    failures: Vec<ResourceFailure>,
}

impl Outcome {
    fn replace(text: String) -> Self {
        Self {
            replacement: Some(text),
            failures: Vec::new(),
        }
    }

    fn keep() -> Self {
        Self {
            replacement: None,
            failures: Vec::new(),
        }
    }

    fn failed(m: &ReferenceMatch, location: String, error: InlineError) -> Self {
        Self {
            replacement: None,
            failures: vec![ResourceFailure {
                reference: m.reference.clone(),
                location,
                kind: m.kind,
                error,
            }],
        }
    }
}

impl Inliner {
    /// Create a new inliner builder
    pub fn builder() -> InlinerBuilder {
        InlinerBuilder::new()
    }

    /// Inliner with the given options and default loaders
    pub fn with_options(options: InlineOptions) -> Self {
        InlinerBuilder::new().options(options).build()
    }

    pub fn options(&self) -> &InlineOptions {
        &self.options
    }

    /// Inline stylesheets, scripts and images of an HTML document
    pub async fn html(&self, text: &str, relative_to: &str) -> InlineOutput {
        let matches = self.extractor.html(text);
        self.run(text, matches, relative_to).await
    }

    /// Inline `url()` references of a CSS document
    pub async fn css(&self, text: &str, relative_to: &str) -> InlineOutput {
        let matches = self.extractor.css(text);
        self.run(text, matches, relative_to).await
    }

    async fn run(
        &self,
        text: &str,
        matches: Vec<ReferenceMatch>,
        relative_to: &str,
    ) -> InlineOutput {
        let base = Location::base(relative_to).await;
        let scope = Scope {
            base: base.as_ref().map_err(|_| relative_to),
            stylesheet: None,
        };
        let (text, failures) = self.apply(text, matches, scope).await;
        self.finish(text, failures)
    }

    /// Fetch, build and splice every approved match of `text`
    async fn apply(
        &self,
        text: &str,
        matches: Vec<ReferenceMatch>,
        scope: Scope<'_>,
    ) -> (String, Vec<ResourceFailure>) {
        let (approved, skipped): (Vec<_>, Vec<_>) = matches
            .into_iter()
            .partition(|m| policy::should_inline(m, &self.options));
        debug!(
            approved = approved.len(),
            skipped = skipped.len(),
            "Extracted references"
        );

        // Barrier: every outcome, failures included, is in before splicing
        let outcomes = join_all(approved.iter().map(|m| self.process(m, scope))).await;

        let mut replacements = Vec::new();
        let mut failures = Vec::new();
        for (m, outcome) in approved.iter().zip(outcomes) {
            failures.extend(outcome.failures);
            if let Some(text) = outcome.replacement.or_else(|| scope.rebased(m)) {
                replacements.push((m.span.clone(), text));
            }
        }
        for m in &skipped {
            if let Some(text) = scope.rebased(m) {
                replacements.push((m.span.clone(), text));
            }
        }

        debug!(replaced = replacements.len(), failed = failures.len(), "Substituting");
        (splice(text, replacements), failures)
    }

    /// Load one reference and build its replacement
    async fn process(&self, m: &ReferenceMatch, scope: Scope<'_>) -> Outcome {
        let location = match scope.resolve(&m.reference) {
            Ok(location) => location,
            Err(error) => return Outcome::failed(m, m.reference.clone(), error),
        };

        let resource = match self.loaders.load(&location, &self.options).await {
            Ok(resource) => resource,
            Err(error) => return Outcome::failed(m, location.to_string(), error),
        };

        if !policy::fits_threshold(m, resource.len(), &self.options) {
            debug!(reference = %m.reference, size = resource.len(), "Over size threshold");
            return Outcome::keep();
        }

        match m.kind {
            ReferenceKind::Image | ReferenceKind::CssUrl => {
                Outcome::replace(m.with_reference(&resource.data_uri()))
            }
            ReferenceKind::Script => Outcome::replace(self.script_tag(m, &resource)),
            ReferenceKind::Stylesheet => {
                let (css, failures) = self.inline_stylesheet(&resource, &m.reference).await;
                Outcome {
                    replacement: Some(self.style_tag(m, &css)),
                    failures,
                }
            }
        }
    }

    /// Inline the `url()` references of a fetched stylesheet
    ///
    /// References resolve against the stylesheet's own location. Nested
    /// stylesheets are not followed, so this recurses at most one level.
    fn inline_stylesheet<'a>(
        &'a self,
        resource: &'a Resource,
        href: &'a str,
    ) -> BoxFuture<'a, (String, Vec<ResourceFailure>)> {
        async move {
            let css = resource.text();
            let child_base = resource.location.child_base();
            let scope = Scope {
                base: Ok(&child_base),
                stylesheet: Some((href, &resource.location)),
            };
            let matches = self.extractor.css(&css);
            self.apply(&css, matches, scope).await
        }
        .boxed()
    }

    fn script_tag(&self, m: &ReferenceMatch, resource: &Resource) -> String {
        let js = resource.text();
        let js = SCRIPT_END_RE.replace_all(&js, |caps: &Captures<'_>| format!("<\\/{}", &caps[1]));
        format!(
            "<script{}>\n{}\n</script>",
            self.kept_attributes(m, SCRIPT_ONLY_ATTRIBUTES),
            js
        )
    }

    fn style_tag(&self, m: &ReferenceMatch, css: &str) -> String {
        format!(
            "<style{}>\n{}\n</style>",
            self.kept_attributes(m, LINK_ONLY_ATTRIBUTES),
            css
        )
    }

    /// Attributes carried over to the replacement tag, each with a leading space
    fn kept_attributes(&self, m: &ReferenceMatch, dropped: &[&str]) -> String {
        let markers = self.extractor.marker_attributes();
        m.attributes
            .iter()
            .filter(|a| !dropped.contains(&a.name.as_str()) && !markers.contains(&a.name.as_str()))
            .map(|a| format!(" {}", a.raw))
            .collect()
    }

    fn finish(&self, text: String, failures: Vec<ResourceFailure>) -> InlineOutput {
        if failures.is_empty() {
            return InlineOutput { text, error: None };
        }
        if self.options.strict {
            return InlineOutput {
                text,
                error: Some(AggregateError { failures }),
            };
        }
        for failure in &failures {
            self.warning_sink.warn(failure);
        }
        InlineOutput { text, error: None }
    }
}

/// Replace each span of `text`; spans must not overlap
fn splice(text: &str, mut replacements: Vec<(Range<usize>, String)>) -> String {
    replacements.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in replacements {
        if span.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
