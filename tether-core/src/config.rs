//! Runtime configuration.
//!
//! Everything has a sensible default; hosts that want to tune behavior can
//! deserialize a [`BindingConfig`] from JSON (or any serde format) and pass it
//! to [`Bindings::new`](crate::binding::Bindings::new).

use serde::{Deserialize, Serialize};

/// Default cap on coalesced dispatch passes per `invoke`.
pub const DEFAULT_MAX_PASSES: usize = 32;

/// What to do when an observable is touched from a thread other than the one
/// that first used it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPolicy {
    /// Panic immediately. Default in debug builds.
    Panic,
    /// Log an error and carry on. Default in release builds.
    Log,
}

impl Default for ThreadPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ThreadPolicy::Panic
        } else {
            ThreadPolicy::Log
        }
    }
}

/// Settings for a single tracked action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of dispatch passes a single `invoke` may run when
    /// handlers keep re-triggering it.
    pub max_passes: usize,

    pub thread_policy: ThreadPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            thread_policy: ThreadPolicy::default(),
        }
    }
}

/// Configuration for a [`Bindings`](crate::binding::Bindings) context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Applied to every field initialized through this context.
    pub dispatch: DispatchConfig,

    /// Warn about observable fields that nobody listens to.
    pub warn_unbound_fields: bool,

    /// Push the current field value into a UI component as soon as it is
    /// bound, instead of waiting for the first change.
    pub sync_ui_on_bind: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            warn_unbound_fields: true,
            sync_ui_on_bind: true,
        }
    }
}

impl BindingConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
