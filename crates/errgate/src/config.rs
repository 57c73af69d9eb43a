//! Guard configuration.
//!
//! [`GuardConfig`] is serializable so embedders can load it alongside their own settings.

use serde::{Deserialize, Serialize};

/// Configuration for boundary guards.
///
/// Use `GuardConfig::default()` for the standard behaviour (catch panics, no message
/// limit), or adjust it with the builder methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Catch Rust panics inside guarded bodies and report them as unstructured faults.
    ///
    /// When disabled a panic unwinds out of the guard; across an `extern "C"` boundary
    /// that aborts the process.
    pub catch_panics: bool,
    /// Maximum length in bytes of a runtime-error message set by the guard.
    pub max_message_len: Option<usize>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            max_message_len: None,
        }
    }
}

impl GuardConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether panics are caught.
    #[must_use]
    pub fn catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Sets the maximum message length in bytes.
    #[must_use]
    pub fn max_message_len(mut self, limit: usize) -> Self {
        self.max_message_len = Some(limit);
        self
    }
}
