//! Inclusion policy
//!
//! Decides per reference whether it is inlined. Explicit markers always win;
//! stylesheets and scripts follow their on/off toggles; images and CSS
//! `url()` references follow the image policy, with a numeric policy acting
//! as a size threshold in kilobytes.

use crate::client::InlineOptions;
use crate::types::{ImagePolicy, Marker, ReferenceKind, ReferenceMatch};

/// Bytes per kilobyte used by size thresholds
pub const BYTES_PER_KB: f64 = 1000.0;

/// Whether `m` should be fetched and inlined
///
/// A numeric image policy with no declared size includes the reference;
/// [`fits_threshold`] then gates it on the fetched size.
pub fn should_inline(m: &ReferenceMatch, options: &InlineOptions) -> bool {
    match m.marker {
        Some(Marker::Include) => return true,
        Some(Marker::Exclude) => return false,
        None => {}
    }

    match m.kind {
        ReferenceKind::Stylesheet => options.links,
        ReferenceKind::Script => options.scripts,
        ReferenceKind::Image | ReferenceKind::CssUrl => match options.images {
            ImagePolicy::Enabled(enabled) => enabled,
            ImagePolicy::MaxKb(max_kb) => m.size_hint_kb.map_or(true, |kb| kb <= max_kb),
        },
    }
}

/// Whether a fetched payload of `size` bytes may be inlined for `m`
///
/// Only binary references under a numeric policy are gated; an opt-in
/// marker bypasses the threshold.
pub fn fits_threshold(m: &ReferenceMatch, size: usize, options: &InlineOptions) -> bool {
    if !m.kind.is_binary() || m.marker == Some(Marker::Include) {
        return true;
    }
    match options.images.threshold_kb() {
        Some(max_kb) => size as f64 <= max_kb * BYTES_PER_KB,
        None => true,
    }
}
