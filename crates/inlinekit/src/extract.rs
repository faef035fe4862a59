//! Reference extraction
//!
//! Finds inlineable references in HTML and CSS text by pattern matching.
//! No document tree is built; every match records its exact byte span so
//! the orchestrator can splice replacements back without re-scanning.

use crate::escape::escape_special_chars;
use crate::location::is_fetchable;
use crate::types::{Attribute, Marker, ReferenceKind, ReferenceMatch};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::warn;

/// `<link ...>`, `<script ...>` or `<img ...>`, tolerating `>` inside quoted values
///
/// Quotes only delimit a value when they follow `=`; a stray apostrophe in an
/// unquoted value is plain text.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<(link|script|img)\b((?:\s*=\s*"[^"]*"|\s*=\s*'[^']*'|[^>])*)>"#).unwrap()
});

/// Closing tag directly after an empty `<script src>`
static SCRIPT_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*</script\s*>").unwrap());

/// Start of a region whose content is not markup: a comment, or an opening
/// `<script>` / `<style>` tag
static OPAQUE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<!--|<(script|style)\b((?:\s*=\s*"[^"]*"|\s*=\s*'[^']*'|[^>])*)>"#)
        .unwrap()
});

static SCRIPT_END_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</script\s*>").unwrap());

static STYLE_END_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</style\s*>").unwrap());

const COMMENT_END: &str = "-->";

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).unwrap()
});

/// `url(...)` with double, single or no quotes
static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)\s'"]*))\s*\)"#).unwrap()
});

static CSS_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Finds references in document text
#[derive(Debug, Clone)]
pub struct Extractor {
    include_attribute: String,
    exclude_attribute: String,
    size_attribute: String,
    /// `/* data-inline */` or `/* data-inline-ignore */`
    css_marker: Option<Regex>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(crate::DEFAULT_INLINE_ATTRIBUTE)
    }
}

impl Extractor {
    /// Create an extractor for the given marker attribute name
    ///
    /// `<name>` opts in, `<name>-ignore` opts out and `<name>-size` declares
    /// an image size in kilobytes.
    pub fn new(inline_attribute: &str) -> Self {
        let name = inline_attribute.trim().to_lowercase();
        let pattern = format!(r"(?i)/\*\s*({})(-ignore)?\s*\*/", escape_special_chars(&name));
        let css_marker = match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(attribute = %name, error = %e, "CSS markers disabled");
                None
            }
        };

        Self {
            exclude_attribute: format!("{name}-ignore"),
            size_attribute: format!("{name}-size"),
            include_attribute: name,
            css_marker,
        }
    }

    /// Stylesheet links, scripts and images in an HTML document
    pub fn html(&self, text: &str) -> Vec<ReferenceMatch> {
        let opaque = html_opaque_ranges(text);
        let mut matches = Vec::new();

        for caps in TAG_RE.captures_iter(text) {
            let (Some(whole), Some(attrs)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if opaque.iter().any(|r| r.contains(&whole.start())) {
                continue;
            }
            let tag = caps[1].to_lowercase();
            let attrs_text = attrs.as_str();
            let parsed = parse_attributes(attrs_text);

            let (kind, source_attr) = match tag.as_str() {
                "link" if is_stylesheet(&parsed) => (ReferenceKind::Stylesheet, "href"),
                "script" => (ReferenceKind::Script, "src"),
                "img" => (ReferenceKind::Image, "src"),
                _ => continue,
            };

            let Some(source) = parsed.iter().find(|a| a.attribute.name == source_attr) else {
                continue;
            };
            let Some(value_span) = source.value_span.clone() else {
                continue;
            };

            let mut end = whole.end();
            if kind == ReferenceKind::Script && !attrs_text.trim_end().ends_with('/') {
                match SCRIPT_CLOSE_RE.find(&text[end..]) {
                    Some(close) => end += close.end(),
                    // A script with inline content is left alone
                    None => continue,
                }
            }

            let start = whole.start();
            let offset = attrs.start() - start;
            let raw_value = &attrs_text[value_span.clone()];
            let reference = raw_value.trim();
            if !is_fetchable(reference) {
                continue;
            }
            let leading = raw_value.len() - raw_value.trim_start().len();
            let ref_start = offset + value_span.start + leading;

            let attributes: Vec<Attribute> = parsed.into_iter().map(|p| p.attribute).collect();
            matches.push(ReferenceMatch {
                raw: text[start..end].to_string(),
                span: start..end,
                reference: reference.to_string(),
                reference_span: ref_start..ref_start + reference.len(),
                kind,
                size_hint_kb: self.size_hint(&attributes),
                marker: self.marker(&attributes),
                attributes,
            });
        }

        dedup_overlapping(matches)
    }

    /// `url(...)` references in CSS text
    pub fn css(&self, text: &str) -> Vec<ReferenceMatch> {
        let comments: Vec<Range<usize>> =
            CSS_COMMENT_RE.find_iter(text).map(|m| m.range()).collect();
        let mut matches = Vec::new();

        for caps in CSS_URL_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if comments.iter().any(|r| r.contains(&whole.start())) {
                continue;
            }
            let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
                continue;
            };
            let reference = value.as_str().trim();
            if !is_fetchable(reference) {
                continue;
            }
            let leading = value.as_str().len() - value.as_str().trim_start().len();
            let ref_start = value.start() - whole.start() + leading;

            matches.push(ReferenceMatch {
                raw: whole.as_str().to_string(),
                span: whole.range(),
                reference: reference.to_string(),
                reference_span: ref_start..ref_start + reference.len(),
                kind: ReferenceKind::CssUrl,
                size_hint_kb: None,
                marker: self.css_marker_after(&text[whole.end()..]),
                attributes: Vec::new(),
            });
        }

        dedup_overlapping(matches)
    }

    fn marker(&self, attributes: &[Attribute]) -> Option<Marker> {
        if attributes.iter().any(|a| a.name == self.exclude_attribute) {
            Some(Marker::Exclude)
        } else if attributes.iter().any(|a| a.name == self.include_attribute) {
            Some(Marker::Include)
        } else {
            None
        }
    }

    fn size_hint(&self, attributes: &[Attribute]) -> Option<f64> {
        attributes
            .iter()
            .find(|a| a.name == self.size_attribute)
            .and_then(|a| a.value.as_deref())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|kb| kb.is_finite() && *kb >= 0.0)
    }

    /// Marker comment later in the same declaration, before the next `url(`
    fn css_marker_after(&self, rest: &str) -> Option<Marker> {
        let re = self.css_marker.as_ref()?;
        let lower = rest.to_ascii_lowercase();
        let end = [lower.find(';'), lower.find('}'), lower.find("url(")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(rest.len());
        let caps = re.captures(&rest[..end])?;
        if caps.get(2).is_some() {
            Some(Marker::Exclude)
        } else {
            Some(Marker::Include)
        }
    }

    /// Names of the attributes this extractor treats as markers
    pub(crate) fn marker_attributes(&self) -> [&str; 3] {
        [
            self.include_attribute.as_str(),
            self.exclude_attribute.as_str(),
            self.size_attribute.as_str(),
        ]
    }
}

struct ParsedAttribute {
    attribute: Attribute,
    /// Value span relative to the attribute text
    value_span: Option<Range<usize>>,
}

fn parse_attributes(text: &str) -> Vec<ParsedAttribute> {
    ATTR_RE
        .captures_iter(text)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4));
            ParsedAttribute {
                attribute: Attribute {
                    name: caps[1].to_lowercase(),
                    value: value.map(|v| v.as_str().to_string()),
                    raw: caps[0].to_string(),
                },
                value_span: value.map(|v| v.range()),
            }
        })
        .collect()
}

fn is_stylesheet(attributes: &[ParsedAttribute]) -> bool {
    attributes.iter().any(|a| {
        a.attribute.name == "rel"
            && a.attribute
                .value
                .as_deref()
                .is_some_and(|v| v.split_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")))
    })
}

/// Comments and inline script/style bodies
///
/// A self-closing `<script src=... />` has no body and opens no region.
fn html_opaque_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(caps) = OPAQUE_START_RE.captures_at(text, pos) {
        let Some(open) = caps.get(0) else {
            break;
        };

        let Some(tag) = caps.get(1) else {
            // Comment
            match text[open.end()..].find(COMMENT_END) {
                Some(i) => {
                    let end = open.end() + i + COMMENT_END.len();
                    ranges.push(open.start()..end);
                    pos = end;
                }
                None => pos = open.end(),
            }
            continue;
        };

        let self_closing = caps
            .get(2)
            .is_some_and(|attrs| attrs.as_str().trim_end().ends_with('/'));
        if self_closing {
            pos = open.end();
            continue;
        }

        let end_re = if tag.as_str().eq_ignore_ascii_case("script") {
            &*SCRIPT_END_TAG_RE
        } else {
            &*STYLE_END_TAG_RE
        };
        match end_re.find_at(text, open.end()) {
            Some(close) => {
                if close.start() > open.end() {
                    ranges.push(open.end()..close.start());
                }
                pos = close.end();
            }
            None => pos = open.end(),
        }
    }

    ranges
}

/// Keep the first of any matches that overlap
fn dedup_overlapping(mut matches: Vec<ReferenceMatch>) -> Vec<ReferenceMatch> {
    matches.sort_by_key(|m| m.span.start);
    let mut kept: Vec<ReferenceMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        if kept.last().is_some_and(|prev| m.span.start < prev.span.end) {
            continue;
        }
        kept.push(m);
    }
    kept
}
