//! Subscription Ledger
//!
//! Every model owns one ledger. It records, per subscriber, each handler that
//! was registered on one of the model's fields and each UI listener that was
//! attached on the model's behalf, so that all of them can be removed in one
//! deterministic pass: either for one subscriber (rebinding, unbinding) or for
//! every subscriber at once (model teardown).
//!
//! # Locking
//!
//! The ledger lock is never held while a tracked action or an adapter is
//! called. Removal takes the entries out first and detaches them afterwards.
//! Detaching a handler makes the tracked action call back into
//! [`SubscriptionLedger::forget`]; during a full cleanup that callback is
//! ignored (the `cleaning` flag) and the ledger is cleared at the end of the
//! pass instead.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::ModelId;
use crate::binding::{ListenerToken, UiAdapter, UiComponent};
use crate::reactive::{ActionControl, HandlerId, SubscriberId};

/// Cap on cleanup rounds when detaching keeps producing new registrations.
const MAX_CLEANUP_ROUNDS: usize = 8;

/// Non-owning link from an observable field back to its model.
#[derive(Clone)]
pub struct ParentLink {
    model: ModelId,
    model_type: &'static str,
    ledger: Weak<SubscriptionLedger>,
}

impl ParentLink {
    pub(crate) fn new(model: ModelId, model_type: &'static str, ledger: &Arc<SubscriptionLedger>) -> Self {
        Self {
            model,
            model_type,
            ledger: Arc::downgrade(ledger),
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn model_type(&self) -> &'static str {
        self.model_type
    }

    /// Whether the owning model is still alive.
    pub fn is_live(&self) -> bool {
        self.ledger.strong_count() > 0
    }

    pub(crate) fn ledger(&self) -> Option<Arc<SubscriptionLedger>> {
        self.ledger.upgrade()
    }
}

impl fmt::Debug for ParentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentLink")
            .field("model", &self.model)
            .field("model_type", &self.model_type)
            .field("live", &self.is_live())
            .finish()
    }
}

/// One handler registration: which field, which handler, and how to detach it.
pub(crate) struct DelegateEntry {
    pub(crate) field: &'static str,
    pub(crate) handler: HandlerId,
    pub(crate) action: Weak<dyn ActionControl>,
}

/// One two-way UI listener: the widget, the adapter that attached it and the
/// adapter's token.
pub(crate) struct UiListenerEntry {
    pub(crate) field: &'static str,
    pub(crate) component: Arc<dyn UiComponent>,
    pub(crate) adapter: Arc<dyn UiAdapter>,
    pub(crate) token: ListenerToken,
}

/// What a removal pass actually detached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalStats {
    pub delegates: usize,
    pub ui_listeners: usize,
}

impl RemovalStats {
    pub fn is_empty(&self) -> bool {
        self.delegates == 0 && self.ui_listeners == 0
    }

    fn absorb(&mut self, other: RemovalStats) {
        self.delegates += other.delegates;
        self.ui_listeners += other.ui_listeners;
    }
}

#[derive(Default)]
struct LedgerState {
    delegates: IndexMap<SubscriberId, SmallVec<[DelegateEntry; 4]>>,
    ui_listeners: IndexMap<SubscriberId, Vec<UiListenerEntry>>,
    cleaning: bool,
}

/// Per-model registry of live subscriptions.
pub struct SubscriptionLedger {
    model: ModelId,
    state: Mutex<LedgerState>,
}

impl SubscriptionLedger {
    pub(crate) fn new(model: ModelId) -> Arc<Self> {
        Arc::new(Self {
            model,
            state: Mutex::new(LedgerState::default()),
        })
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub(crate) fn record(&self, subscriber: SubscriberId, entry: DelegateEntry) {
        tracing::trace!(
            model = %self.model,
            %subscriber,
            field = entry.field,
            handler = entry.handler.raw(),
            "recording delegate"
        );
        self.state
            .lock()
            .delegates
            .entry(subscriber)
            .or_default()
            .push(entry);
    }

    pub(crate) fn record_ui_listener(&self, subscriber: SubscriberId, entry: UiListenerEntry) {
        tracing::trace!(
            model = %self.model,
            %subscriber,
            field = entry.field,
            ui_type = entry.component.type_name(),
            "recording UI listener"
        );
        self.state
            .lock()
            .ui_listeners
            .entry(subscriber)
            .or_default()
            .push(entry);
    }

    /// Drop the record of a handler that was removed from its action.
    pub(crate) fn forget(&self, subscriber: SubscriberId, handler: HandlerId) {
        let mut state = self.state.lock();
        if state.cleaning {
            return;
        }

        let emptied = match state.delegates.get_mut(&subscriber) {
            Some(entries) => {
                entries.retain(|entry| entry.handler != handler);
                entries.is_empty()
            }
            None => false,
        };
        if emptied {
            state.delegates.shift_remove(&subscriber);
        }
    }

    /// Remove every delegate and UI listener recorded for `subscriber`.
    ///
    /// Safe to call when nothing is recorded.
    pub fn remove_subscriber(&self, subscriber: SubscriberId) -> RemovalStats {
        let (delegates, listeners) = {
            let mut state = self.state.lock();
            (
                state.delegates.shift_remove(&subscriber).unwrap_or_default(),
                state.ui_listeners.shift_remove(&subscriber).unwrap_or_default(),
            )
        };

        let stats = detach_all(delegates, listeners);
        if !stats.is_empty() {
            tracing::debug!(
                model = %self.model,
                %subscriber,
                delegates = stats.delegates,
                ui_listeners = stats.ui_listeners,
                "removed subscriptions"
            );
        }
        stats
    }

    /// Remove every delegate and UI listener for every subscriber.
    pub fn cleanup(&self) -> RemovalStats {
        let mut total = RemovalStats::default();

        for round in 0..MAX_CLEANUP_ROUNDS {
            let (delegates, listeners) = {
                let mut state = self.state.lock();
                if state.delegates.is_empty() && state.ui_listeners.is_empty() {
                    break;
                }
                if round > 0 {
                    tracing::warn!(model = %self.model, round, "subscriptions added during cleanup");
                }
                state.cleaning = true;
                let delegates: Vec<DelegateEntry> = std::mem::take(&mut state.delegates)
                    .into_values()
                    .flatten()
                    .collect();
                let listeners: Vec<UiListenerEntry> = std::mem::take(&mut state.ui_listeners)
                    .into_values()
                    .flatten()
                    .collect();
                (delegates, listeners)
            };

            total.absorb(detach_all(delegates, listeners));
            self.state.lock().cleaning = false;
        }

        tracing::debug!(
            model = %self.model,
            delegates = total.delegates,
            ui_listeners = total.ui_listeners,
            "model subscriptions cleaned up"
        );
        total
    }

    /// Subscribers with at least one live registration.
    pub fn subscribers(&self) -> Vec<SubscriberId> {
        let state = self.state.lock();
        let mut ids: Vec<SubscriberId> = state.delegates.keys().copied().collect();
        for id in state.ui_listeners.keys() {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    /// Number of delegates recorded for `subscriber`.
    pub fn delegate_count(&self, subscriber: SubscriberId) -> usize {
        self.state
            .lock()
            .delegates
            .get(&subscriber)
            .map_or(0, |entries| entries.len())
    }

    /// Number of UI listeners recorded for `subscriber`.
    pub fn ui_listener_count(&self, subscriber: SubscriberId) -> usize {
        self.state
            .lock()
            .ui_listeners
            .get(&subscriber)
            .map_or(0, |entries| entries.len())
    }

    /// Total registrations across all subscribers.
    pub fn total(&self) -> RemovalStats {
        let state = self.state.lock();
        RemovalStats {
            delegates: state.delegates.values().map(|e| e.len()).sum(),
            ui_listeners: state.ui_listeners.values().map(|e| e.len()).sum(),
        }
    }
}

impl fmt::Debug for SubscriptionLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total();
        f.debug_struct("SubscriptionLedger")
            .field("model", &self.model)
            .field("delegates", &total.delegates)
            .field("ui_listeners", &total.ui_listeners)
            .finish()
    }
}

fn detach_all<D, L>(delegates: D, listeners: L) -> RemovalStats
where
    D: IntoIterator<Item = DelegateEntry>,
    L: IntoIterator<Item = UiListenerEntry>,
{
    let mut stats = RemovalStats::default();

    for entry in delegates {
        // The action may already be gone together with its field.
        if let Some(action) = entry.action.upgrade() {
            if action.detach(entry.handler) {
                stats.delegates += 1;
            }
        }
    }

    for entry in listeners {
        entry
            .adapter
            .remove_listener(entry.component.as_ref(), entry.token);
        stats.ui_listeners += 1;
    }

    stats
}
