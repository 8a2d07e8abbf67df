//! Observable Variable
//!
//! An `ObservableVariable<T>` is a single reactive slot. It holds the current
//! value, the value it held before the last write, and the tracked action that
//! notifies handlers.
//!
//! # Write Semantics
//!
//! Every write notifies, even when the new value equals the old one. Some
//! state transitions rely on "touch" semantics, so there is no equality check.
//!
//! A write runs in three steps:
//!
//! 1. The current value moves into `previous`.
//! 2. The new value is committed.
//! 3. The tracked action is invoked with the variable itself as payload, so
//!    handlers read `value()` and `previous_value()` from it.
//!
//! # Sharing
//!
//! Like a signal, the variable is a handle: cloning it shares state with the
//! original.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::dynamic::{decode, encode, encode_exact, DynHandler, DynObservable, ObservableField, ObservableKind};
use super::{HandlerId, SubscriberId, TrackedAction};
use crate::config::DispatchConfig;
use crate::error::ValueError;
use crate::model::{ModelId, ParentLink};

struct VariableState<T> {
    value: T,
    previous: T,
}

struct VariableInner<T: Clone + Send + Sync + 'static> {
    state: RwLock<VariableState<T>>,
    on_value_changed: TrackedAction<ObservableVariable<T>>,
}

/// A reactive scalar.
///
/// # Example
///
/// ```rust,ignore
/// let health = ObservableVariable::new(100);
/// health.subscribe(|hp| println!("{} -> {}", hp.previous_value(), hp.value()));
///
/// health.set_value(80); // prints "100 -> 80"
/// ```
pub struct ObservableVariable<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<VariableInner<T>>,
}

impl<T> ObservableVariable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a variable holding `value`. Its previous value starts out equal
    /// to the initial value.
    pub fn new(value: T) -> Self {
        Self::with_config(value, DispatchConfig::default())
    }

    pub fn with_config(value: T, config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(VariableInner {
                state: RwLock::new(VariableState {
                    previous: value.clone(),
                    value,
                }),
                on_value_changed: TrackedAction::with_config(config),
            }),
        }
    }

    /// Get a clone of the current value.
    pub fn value(&self) -> T {
        self.inner.state.read().value.clone()
    }

    /// Borrow the current value without cloning it.
    ///
    /// The closure runs under a read lock; it must not write to this variable.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.read().value)
    }

    /// The value held immediately before the last completed write.
    pub fn previous_value(&self) -> T {
        self.inner.state.read().previous.clone()
    }

    /// Assign a new value and notify every handler.
    pub fn set_value(&self, value: T) {
        {
            let mut state = self.inner.state.write();
            let old = std::mem::replace(&mut state.value, value);
            state.previous = old;
        }
        self.inner.on_value_changed.invoke(self);
    }

    /// Compute the next value from the current one and assign it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.with_value(f);
        self.set_value(next);
    }

    /// Notify handlers again without changing the value.
    pub fn force_notify(&self) {
        self.inner.on_value_changed.invoke(self);
    }

    /// The tracked action behind this variable.
    pub fn on_value_changed(&self) -> &TrackedAction<Self> {
        &self.inner.on_value_changed
    }

    /// Register a change handler that is not tied to any subscriber.
    pub fn subscribe<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        self.inner.on_value_changed.add(Arc::new(handler), None)
    }

    /// Register a change handler on behalf of `subscriber`, so it is removed
    /// together with the subscriber's other registrations.
    pub fn subscribe_as<F>(&self, subscriber: SubscriberId, handler: F) -> HandlerId
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        self.inner
            .on_value_changed
            .add(Arc::new(handler), Some(subscriber))
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.inner.on_value_changed.remove(id)
    }

    pub fn handler_count(&self) -> usize {
        self.inner.on_value_changed.handler_count()
    }

    /// The model this variable belongs to, once attached.
    pub fn parent_model(&self) -> Option<ModelId> {
        self.inner.on_value_changed.parent().map(|link| link.model())
    }

    /// Whether two handles refer to the same variable.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> DynObservable for ObservableVariable<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    fn kind(&self) -> ObservableKind {
        ObservableKind::Variable
    }

    fn value_type(&self) -> &'static str {
        Self::value_type_name()
    }

    fn current_value(&self) -> Result<Value, ValueError> {
        self.with_value(|value| encode(value))
    }

    fn previous_value(&self) -> Result<Value, ValueError> {
        encode(&self.inner.state.read().previous)
    }

    fn current_any(&self) -> Box<dyn Any + Send> {
        Box::new(self.value())
    }

    fn previous_any(&self) -> Box<dyn Any + Send> {
        Box::new(ObservableVariable::previous_value(self))
    }

    fn persisted_value(&self) -> Result<Value, ValueError> {
        self.with_value(|value| encode_exact::<T, T>(value))
    }

    fn assign_value(&self, value: Value) -> Result<(), ValueError> {
        let value: T = decode(value)?;
        self.set_value(value);
        Ok(())
    }

    fn force_notify(&self) {
        ObservableVariable::force_notify(self);
    }

    fn subscribe_dyn(&self, handler: DynHandler, subscriber: Option<SubscriberId>) -> HandlerId {
        self.inner.on_value_changed.add(
            Arc::new(move |variable: &ObservableVariable<T>| handler(variable)),
            subscriber,
        )
    }

    fn unsubscribe(&self, id: HandlerId) -> bool {
        ObservableVariable::unsubscribe(self, id)
    }

    fn handler_count(&self) -> usize {
        ObservableVariable::handler_count(self)
    }

    fn parent(&self) -> Option<ParentLink> {
        self.inner.on_value_changed.parent()
    }

    fn attach(&self, link: ParentLink, label: &'static str) -> Option<ParentLink> {
        self.inner.on_value_changed.attach(link, label)
    }

    fn set_dispatch_config(&self, config: DispatchConfig) {
        self.inner.on_value_changed.set_config(config);
    }
}

impl<T> ObservableField for ObservableVariable<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    const KIND: ObservableKind = ObservableKind::Variable;

    fn value_type_name() -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T> Clone for ObservableVariable<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ObservableVariable<T>
where
    T: Clone + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for ObservableVariable<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("ObservableVariable")
            .field("value", &state.value)
            .field("previous", &state.previous)
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
