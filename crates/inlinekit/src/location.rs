//! Resolution of reference strings against a base location

use crate::error::InlineError;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Schemes that can be loaded
const FETCHABLE_SCHEMES: &[&str] = &["http", "https", "file"];

/// Scheme used for protocol-relative references under a local base
const DEFAULT_REMOTE_SCHEME: &str = "https";

/// Where a resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Filesystem path (a directory when used as a base)
    Local(PathBuf),
    /// http(s) URL
    Remote(Url),
}

impl Location {
    /// Parse the `relative_to` value of a request into a base location
    ///
    /// A local base names a directory; if it points at an existing file,
    /// that file's directory is used instead.
    pub async fn base(relative_to: &str) -> Result<Self, InlineError> {
        let relative_to = relative_to.trim();
        match scheme_of(relative_to).as_deref() {
            Some("http") | Some("https") => Url::parse(relative_to)
                .map(Location::Remote)
                .map_err(|_| InlineError::InvalidUrl(relative_to.to_string())),
            Some("file") => {
                let path = file_url_to_path(relative_to)?;
                Ok(Location::Local(directory_of(path).await))
            }
            _ if relative_to.starts_with("//") => Url::parse(&format!(
                "{DEFAULT_REMOTE_SCHEME}:{relative_to}"
            ))
            .map(Location::Remote)
            .map_err(|_| InlineError::InvalidUrl(relative_to.to_string())),
            _ if relative_to.is_empty() => Ok(Location::Local(PathBuf::from("."))),
            _ => Ok(Location::Local(
                directory_of(PathBuf::from(relative_to)).await,
            )),
        }
    }

    /// Resolve a reference as written in a document against this base
    pub fn resolve(&self, reference: &str) -> Result<Location, InlineError> {
        let reference = reference.trim();
        let invalid = || InlineError::InvalidUrl(reference.to_string());

        match scheme_of(reference).as_deref() {
            Some("http") | Some("https") => {
                return Url::parse(reference).map(Location::Remote).map_err(|_| invalid());
            }
            Some("file") => return file_url_to_path(reference).map(Location::Local),
            Some(_) => return Err(InlineError::UnsupportedLocation(reference.to_string())),
            None => {}
        }

        if reference.starts_with("//") {
            let scheme = match self {
                Location::Remote(base) => base.scheme(),
                Location::Local(_) => DEFAULT_REMOTE_SCHEME,
            };
            return Url::parse(&format!("{scheme}:{reference}"))
                .map(Location::Remote)
                .map_err(|_| invalid());
        }

        match self {
            Location::Remote(base) => base
                .join(reference)
                .map(Location::Remote)
                .map_err(|_| invalid()),
            Location::Local(dir) => {
                let path = strip_query_and_fragment(reference).trim_start_matches('/');
                Ok(Location::Local(dir.join(path)))
            }
        }
    }

    /// Base that references found inside this resource resolve against
    pub fn child_base(&self) -> Location {
        match self {
            Location::Local(path) => Location::Local(
                path.parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            ),
            Location::Remote(url) => Location::Remote(url.clone()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    /// MIME type guessed from the file extension
    pub fn guess_mime(&self) -> Option<&'static str> {
        match self {
            Location::Local(path) => mime_guess::from_path(path).first_raw(),
            Location::Remote(url) => mime_guess::from_path(url.path()).first_raw(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Whether a reference points at something that can be loaded
///
/// Rejects empty references, fragment-only references, data URIs and
/// schemes other than http, https and file.
pub fn is_fetchable(reference: &str) -> bool {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return false;
    }
    match scheme_of(reference) {
        Some(scheme) => FETCHABLE_SCHEMES.contains(&scheme.as_str()),
        None => true,
    }
}

/// Rewrite a reference found inside an inlined stylesheet so it stays valid
/// relative to the document the stylesheet is inlined into
///
/// `stylesheet_href` is the stylesheet reference as written in the document
/// and `stylesheet` its resolved location. Returns `None` when the reference
/// needs no rewriting.
pub fn rebase(reference: &str, stylesheet_href: &str, stylesheet: &Location) -> Option<String> {
    let trimmed = reference.trim();
    if !is_fetchable(trimmed) || scheme_of(trimmed).is_some() || trimmed.starts_with('/') {
        return None;
    }
    match stylesheet {
        Location::Remote(url) => url.join(trimmed).ok().map(|u| u.to_string()),
        Location::Local(_) => {
            let dir_end = stylesheet_href.rfind('/')? + 1;
            Some(format!("{}{}", &stylesheet_href[..dir_end], trimmed))
        }
    }
}

/// Lowercased URI scheme, if the reference starts with one
fn scheme_of(reference: &str) -> Option<String> {
    let colon = reference.find(':')?;
    let scheme = &reference[..colon];
    // A single letter is a Windows drive, not a scheme
    if scheme.len() < 2 {
        return None;
    }
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(scheme.to_ascii_lowercase())
    } else {
        None
    }
}

fn strip_query_and_fragment(reference: &str) -> &str {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    &reference[..end]
}

fn file_url_to_path(reference: &str) -> Result<PathBuf, InlineError> {
    Url::parse(reference)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| InlineError::InvalidUrl(reference.to_string()))
}

async fn directory_of(path: PathBuf) -> PathBuf {
    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if is_file {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        path
    }
}
