//! Thread designation for observables.
//!
//! Observables are meant to be driven from a single thread (the host
//! engine's update thread). The first thread that touches a tracked action
//! becomes its owner; any later access from another thread is reported
//! according to the configured [`ThreadPolicy`].

use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use crate::config::ThreadPolicy;

/// Lazily captured owner thread.
#[derive(Debug, Default)]
pub struct ThreadGuard {
    owner: OnceLock<ThreadId>,
}

impl ThreadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The owning thread, if anything has used the guard yet.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.get().copied()
    }

    /// Check that the caller runs on the owning thread, claiming ownership
    /// on first use.
    ///
    /// Returns `false` on a violation when the policy is [`ThreadPolicy::Log`];
    /// panics under [`ThreadPolicy::Panic`].
    pub fn check(&self, policy: ThreadPolicy, operation: &'static str) -> bool {
        let current = thread::current().id();
        let owner = *self.owner.get_or_init(|| current);
        if owner == current {
            return true;
        }

        match policy {
            ThreadPolicy::Panic => panic!(
                "observable {operation} called from {current:?}, but it is owned by {owner:?}"
            ),
            ThreadPolicy::Log => {
                tracing::error!(
                    operation,
                    owner = ?owner,
                    current = ?current,
                    "observable accessed from a foreign thread"
                );
                false
            }
        }
    }
}
