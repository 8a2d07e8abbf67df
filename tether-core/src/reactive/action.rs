//! Tracked Actions
//!
//! A tracked action is the multicast callback list that sits behind every
//! observable field. It differs from a plain `Vec<Box<dyn Fn>>` in four ways:
//!
//! 1. **Idempotent registration.** Adding the same handler (the same `Arc`)
//!    twice keeps a single registration and returns the original ID.
//!
//! 2. **Coalesced reentrancy.** If a handler triggers the action again while
//!    a dispatch is running, the nested `invoke` only sets a pending flag. The
//!    outer dispatch then runs another full pass. Passes are capped by
//!    [`DispatchConfig::max_passes`]; hitting the cap is logged and dispatch
//!    stops instead of spinning forever.
//!
//! 3. **Panic isolation.** Each handler runs under `catch_unwind`; a panicking
//!    handler is logged and the remaining handlers still run.
//!
//! 4. **Cleanup routing.** When a field has been attached to a model, every
//!    registration made on behalf of a subscriber is also recorded in the
//!    model's [`SubscriptionLedger`](crate::model::SubscriptionLedger), so the
//!    model can remove all of them at teardown.
//!
//! # Thread Safety
//!
//! Handler lists are guarded by `parking_lot` mutexes and no lock is held
//! while a handler runs, so handlers may freely add, remove or invoke. The
//! action is nevertheless owned by one thread: see [`ThreadGuard`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::thread::ThreadGuard;
use super::SubscriberId;
use crate::config::DispatchConfig;
use crate::model::{DelegateEntry, ParentLink};

/// A registered callback. Receives the payload of the action, which for
/// observables is the observable itself.
pub type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Identifies one registration on one tracked action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct HandlerSlot<P> {
    id: HandlerId,
    handler: Handler<P>,
    subscriber: Option<SubscriberId>,
}

#[derive(Debug, Default)]
struct DispatchState {
    in_progress: bool,
    pending: bool,
}

struct ActionInner<P> {
    handlers: Mutex<SmallVec<[HandlerSlot<P>; 4]>>,
    dispatch: Mutex<DispatchState>,
    guard: ThreadGuard,
    config: RwLock<DispatchConfig>,
    parent: RwLock<Option<ParentLink>>,
    label: RwLock<&'static str>,
}

/// Type-erased removal hook kept by the subscription ledger.
pub(crate) trait ActionControl: Send + Sync {
    fn detach(&self, id: HandlerId) -> bool;
}

/// Multicast, reentrancy-safe callback list for one observable field.
///
/// Cloning a `TrackedAction` yields another handle to the same handler list.
pub struct TrackedAction<P: 'static> {
    inner: Arc<ActionInner<P>>,
}

impl<P: 'static> TrackedAction<P> {
    /// Create an empty action with the default dispatch configuration.
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    /// Create an empty action with a specific dispatch configuration.
    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(ActionInner {
                handlers: Mutex::new(SmallVec::new()),
                dispatch: Mutex::new(DispatchState::default()),
                guard: ThreadGuard::new(),
                config: RwLock::new(config),
                parent: RwLock::new(None),
                label: RwLock::new("<detached>"),
            }),
        }
    }

    /// Register a handler.
    ///
    /// Registering a handler that is already present (same `Arc`) is a no-op
    /// that returns the existing ID. When `subscriber` is given and the action
    /// belongs to a model, the registration is also recorded in the model's
    /// ledger so it can be removed in bulk.
    pub fn add(&self, handler: Handler<P>, subscriber: Option<SubscriberId>) -> HandlerId {
        self.inner.check_thread("add");

        let id = {
            let mut handlers = self.inner.handlers.lock();
            if let Some(existing) = handlers
                .iter()
                .find(|slot| same_handler(&slot.handler, &handler))
            {
                return existing.id;
            }

            let id = HandlerId::new();
            handlers.push(HandlerSlot {
                id,
                handler,
                subscriber,
            });
            id
        };

        if let Some(subscriber) = subscriber {
            self.record_in_ledger(subscriber, id);
        }

        id
    }

    /// Convenience wrapper around [`add`](Self::add) for closures.
    pub fn subscribe<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.add(Arc::new(handler), None)
    }

    /// Remove a registration. Unknown IDs are ignored.
    ///
    /// Returns `true` if a handler was removed.
    pub fn remove(&self, id: HandlerId) -> bool {
        self.inner.check_thread("remove");
        self.inner.detach(id)
    }

    /// Remove a registration by handler identity.
    pub fn remove_handler(&self, handler: &Handler<P>) -> bool {
        let id = self
            .inner
            .handlers
            .lock()
            .iter()
            .find(|slot| same_handler(&slot.handler, handler))
            .map(|slot| slot.id);

        match id {
            Some(id) => self.remove(id),
            None => false,
        }
    }

    /// Run every registered handler with `payload`.
    ///
    /// If a dispatch is already in progress on this action, the call only
    /// requests another pass and returns immediately.
    pub fn invoke(&self, payload: &P) {
        self.inner.check_thread("invoke");

        {
            let mut state = self.inner.dispatch.lock();
            if state.in_progress {
                state.pending = true;
                tracing::trace!(field = self.inner.label(), "reentrant invoke coalesced");
                return;
            }
            state.in_progress = true;
        }
        let _reset = DispatchReset(&self.inner.dispatch);

        let max_passes = self.inner.config.read().max_passes.max(1);
        let mut passes = 0usize;

        loop {
            passes += 1;
            self.run_pass(payload);

            let rerun = std::mem::take(&mut self.inner.dispatch.lock().pending);
            if !rerun {
                break;
            }
            if passes >= max_passes {
                tracing::error!(
                    field = self.inner.label(),
                    passes,
                    "dispatch aborted: handlers keep re-triggering this action"
                );
                break;
            }
        }
    }

    fn run_pass(&self, payload: &P) {
        let snapshot: SmallVec<[(HandlerId, Handler<P>); 4]> = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|slot| (slot.id, Arc::clone(&slot.handler)))
            .collect();

        for (id, handler) in snapshot {
            // A handler earlier in this pass may have removed this one.
            if !self.inner.is_registered(id) {
                continue;
            }

            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                tracing::error!(
                    field = self.inner.label(),
                    handler = id.raw(),
                    message = panic_message(panic.as_ref()),
                    "change handler panicked"
                );
            }
        }
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    /// Check whether a registration is still present.
    pub fn contains(&self, id: HandlerId) -> bool {
        self.inner.is_registered(id)
    }

    /// Whether a dispatch is currently running.
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatch.lock().in_progress
    }

    /// Current dispatch configuration.
    pub fn config(&self) -> DispatchConfig {
        *self.inner.config.read()
    }

    pub(crate) fn set_config(&self, config: DispatchConfig) {
        *self.inner.config.write() = config;
    }

    /// Link the action to its owning model. Returns the previous link.
    pub(crate) fn attach(&self, link: ParentLink, label: &'static str) -> Option<ParentLink> {
        *self.inner.label.write() = label;
        self.inner.parent.write().replace(link)
    }

    pub(crate) fn parent(&self) -> Option<ParentLink> {
        self.inner.parent.read().clone()
    }

    fn record_in_ledger(&self, subscriber: SubscriberId, id: HandlerId) {
        let Some(link) = self.parent() else {
            return;
        };
        let Some(ledger) = link.ledger() else {
            return;
        };

        let action: Weak<dyn ActionControl> = Arc::downgrade(&self.inner) as Weak<dyn ActionControl>;
        ledger.record(
            subscriber,
            DelegateEntry {
                field: self.inner.label(),
                handler: id,
                action,
            },
        );
    }
}

impl<P: 'static> ActionInner<P> {
    fn check_thread(&self, operation: &'static str) {
        let policy = self.config.read().thread_policy;
        self.guard.check(policy, operation);
    }

    fn label(&self) -> &'static str {
        *self.label.read()
    }

    fn is_registered(&self, id: HandlerId) -> bool {
        self.handlers.lock().iter().any(|slot| slot.id == id)
    }
}

impl<P: 'static> ActionControl for ActionInner<P> {
    fn detach(&self, id: HandlerId) -> bool {
        let removed = {
            let mut handlers = self.handlers.lock();
            handlers
                .iter()
                .position(|slot| slot.id == id)
                .map(|index| handlers.remove(index))
        };

        let Some(slot) = removed else {
            return false;
        };

        // Keep the ledger in step. During a bulk cleanup the ledger ignores
        // this and clears itself at the end of the pass.
        if let Some(subscriber) = slot.subscriber {
            let link = self.parent.read().clone();
            if let Some(ledger) = link.and_then(|link| link.ledger()) {
                ledger.forget(subscriber, id);
            }
        }

        true
    }
}

impl<P: 'static> Default for TrackedAction<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> Clone for TrackedAction<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: 'static> fmt::Debug for TrackedAction<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedAction")
            .field("field", &self.inner.label())
            .field("handler_count", &self.handler_count())
            .field("dispatching", &self.is_dispatching())
            .finish()
    }
}

/// Clears the dispatch flags even if something below unwinds.
struct DispatchReset<'a>(&'a Mutex<DispatchState>);

impl Drop for DispatchReset<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.in_progress = false;
        state.pending = false;
    }
}

fn same_handler<P>(a: &Handler<P>, b: &Handler<P>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Handler<u32>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let handler: Handler<u32> = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn invoke_runs_handlers_in_registration_order() {
        let action = TrackedAction::<u32>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = order.clone();
            action.subscribe(move |value| order.lock().push(format!("{tag}{value}")));
        }

        action.invoke(&7);
        assert_eq!(*order.lock(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn duplicate_handler_is_registered_once() {
        let action = TrackedAction::<u32>::new();
        let (count, handler) = counter();

        let first = action.add(handler.clone(), None);
        let second = action.add(handler, None);

        assert_eq!(first, second);
        assert_eq!(action.handler_count(), 1);

        action.invoke(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removing_unknown_handler_is_a_no_op() {
        let action = TrackedAction::<u32>::new();
        let (_, handler) = counter();
        let id = action.add(handler, None);

        assert!(action.remove(id));
        assert!(!action.remove(id));
        assert_eq!(action.handler_count(), 0);
    }

    #[test]
    fn remove_by_handler_identity() {
        let action = TrackedAction::<u32>::new();
        let (count, handler) = counter();
        action.add(handler.clone(), None);

        assert!(action.remove_handler(&handler));
        action.invoke(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_removed_mid_pass_does_not_run() {
        let action = TrackedAction::<u32>::new();
        let (count, victim) = counter();

        let victim_id = Arc::new(Mutex::new(None::<HandlerId>));
        let action_clone = action.clone();
        let victim_id_clone = victim_id.clone();
        action.subscribe(move |_| {
            if let Some(id) = *victim_id_clone.lock() {
                action_clone.remove(id);
            }
        });
        *victim_id.lock() = Some(action.add(victim, None));

        action.invoke(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(action.handler_count(), 1);
    }

    #[test]
    fn panicking_handler_does_not_block_siblings() {
        let action = TrackedAction::<u32>::new();
        let (count, handler) = counter();

        action.subscribe(|_| panic!("broken handler"));
        action.add(handler, None);

        action.invoke(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!action.is_dispatching());
    }

    #[test]
    fn reentrant_invoke_is_coalesced_into_another_pass() {
        let action = TrackedAction::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let action_clone = action.clone();
        let runs_clone = runs.clone();
        action.subscribe(move |value| {
            let run = runs_clone.fetch_add(1, Ordering::SeqCst);
            if run == 0 {
                // Nested invoke returns immediately and schedules one rerun.
                action_clone.invoke(value);
                action_clone.invoke(value);
                assert_eq!(runs_clone.load(Ordering::SeqCst), 1);
            }
        });

        action.invoke(&1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn runaway_reentrancy_stops_at_the_cap() {
        let action = TrackedAction::<u32>::with_config(DispatchConfig {
            max_passes: 5,
            ..DispatchConfig::default()
        });
        let runs = Arc::new(AtomicUsize::new(0));

        let action_clone = action.clone();
        let runs_clone = runs.clone();
        action.subscribe(move |value| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            action_clone.invoke(value);
        });

        action.invoke(&1);
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        assert!(!action.is_dispatching());

        // The action is usable again afterwards.
        runs.store(0, Ordering::SeqCst);
        action.invoke(&1);
        assert_eq!(runs.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn handler_added_during_dispatch_runs_on_next_invoke() {
        let action = TrackedAction::<u32>::new();
        let (count, late) = counter();

        let action_clone = action.clone();
        action.subscribe(move |_| {
            action_clone.add(late.clone(), None);
        });

        action.invoke(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        action.invoke(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
