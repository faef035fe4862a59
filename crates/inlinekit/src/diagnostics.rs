//! Warning channel for lenient-mode failures

use crate::error::ResourceFailure;
use std::sync::Mutex;
use tracing::warn;

/// Receives one call per reference that could not be inlined when strict
/// mode is off
pub trait WarningSink: Send + Sync {
    fn warn(&self, failure: &ResourceFailure);
}

/// Emits each failure as a `tracing` warning
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, failure: &ResourceFailure) {
        warn!(
            reference = %failure.reference,
            location = %failure.location,
            kind = %failure.kind,
            error = %failure.error,
            "Resource could not be inlined; leaving reference as-is"
        );
    }
}

/// Keeps failure messages in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl WarningSink for CollectingSink {
    fn warn(&self, failure: &ResourceFailure) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(failure.to_string());
    }
}
