//! Observable List
//!
//! The sequence counterpart of [`ObservableVariable`](super::ObservableVariable).
//! Every structural mutation follows the same three steps:
//!
//! 1. Snapshot the live items into `previous`, an immutable `Arc<[T]>`.
//! 2. Mutate the live items.
//! 3. Notify handlers with the list itself as payload.
//!
//! `previous_value()` hands out the snapshot, never the live backing vector,
//! so a handler that iterates it is unaffected by further (reentrant)
//! mutations of the list.
//!
//! Index-based operations validate the index first. An invalid index returns
//! [`ListError::IndexOutOfBounds`] without snapshotting or notifying.

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
use crate::error::{ListError, ValueError};
use crate::model::{ModelId, ParentLink};

struct ListState<T> {
    items: Vec<T>,
    previous: Arc<[T]>,
}

struct ListInner<T: Clone + Send + Sync + 'static> {
    state: RwLock<ListState<T>>,
    on_value_changed: TrackedAction<ObservableList<T>>,
}

/// A reactive, ordered sequence.
pub struct ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ListInner<T>>,
}

impl<T> ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list holding `items`. The previous snapshot starts out equal
    /// to the initial items.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self::with_config(items, DispatchConfig::default())
    }

    pub fn with_config(items: Vec<T>, config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(ListInner {
                state: RwLock::new(ListState {
                    previous: Arc::from(items.as_slice()),
                    items,
                }),
                on_value_changed: TrackedAction::with_config(config),
            }),
        }
    }

    /// Snapshot -> mutate -> notify.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        let result = {
            let mut state = self.inner.state.write();
            let snapshot: Arc<[T]> = Arc::from(state.items.as_slice());
            state.previous = snapshot;
            f(&mut state.items)
        };
        self.inner.on_value_changed.invoke(self);
        result
    }

    /// Clone of the live items.
    pub fn value(&self) -> Vec<T> {
        self.inner.state.read().items.clone()
    }

    /// Borrow the live items. The closure must not mutate this list.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.state.read().items)
    }

    /// The items as they were before the last mutation.
    pub fn previous_value(&self) -> Arc<[T]> {
        Arc::clone(&self.inner.state.read().previous)
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.state.read().items.get(index).cloned()
    }

    /// Replace the whole sequence.
    pub fn set_value(&self, items: Vec<T>) {
        self.mutate(|live| *live = items);
    }

    pub fn push(&self, item: T) {
        self.mutate(|items| items.push(item));
    }

    pub fn extend(&self, iter: impl IntoIterator<Item = T>) {
        self.mutate(|items| items.extend(iter));
    }

    pub fn insert(&self, index: usize, item: T) -> Result<(), ListError> {
        self.check_index(index, true)?;
        self.mutate(|items| items.insert(index, item));
        Ok(())
    }

    /// Replace the item at `index`, returning the old one.
    pub fn set(&self, index: usize, item: T) -> Result<T, ListError> {
        self.check_index(index, false)?;
        Ok(self.mutate(|items| std::mem::replace(&mut items[index], item)))
    }

    pub fn remove_at(&self, index: usize) -> Result<T, ListError> {
        self.check_index(index, false)?;
        Ok(self.mutate(|items| items.remove(index)))
    }

    /// Clear the list. Notifies even if it was already empty.
    pub fn clear(&self) {
        self.mutate(|items| items.clear());
    }

    fn check_index(&self, index: usize, allow_end: bool) -> Result<(), ListError> {
        let len = self.len();
        let valid = if allow_end { index <= len } else { index < len };
        if valid {
            Ok(())
        } else {
            Err(ListError::IndexOutOfBounds { index, len })
        }
    }

    pub fn force_notify(&self) {
        self.inner.on_value_changed.invoke(self);
    }

    pub fn on_value_changed(&self) -> &TrackedAction<Self> {
        &self.inner.on_value_changed
    }

    pub fn subscribe<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        self.inner.on_value_changed.add(Arc::new(handler), None)
    }

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

    pub fn parent_model(&self) -> Option<ModelId> {
        self.inner.on_value_changed.parent().map(|link| link.model())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn contains(&self, item: &T) -> bool {
        self.inner.state.read().items.contains(item)
    }

    /// Remove the first occurrence of `item`.
    ///
    /// Returns `false`, without notifying, if the item is not present.
    pub fn remove(&self, item: &T) -> bool {
        let Some(index) = self
            .inner
            .state
            .read()
            .items
            .iter()
            .position(|candidate| candidate == item)
        else {
            return false;
        };
        self.mutate(|items| {
            items.remove(index);
        });
        true
    }
}

impl<T> DynObservable for ObservableList<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    fn kind(&self) -> ObservableKind {
        ObservableKind::List
    }

    fn value_type(&self) -> &'static str {
        Self::value_type_name()
    }

    fn current_value(&self) -> Result<Value, ValueError> {
        self.with_items(|items| encode(items))
    }

    fn previous_value(&self) -> Result<Value, ValueError> {
        encode(&*ObservableList::previous_value(self))
    }

    fn current_any(&self) -> Box<dyn Any + Send> {
        Box::new(self.value())
    }

    fn previous_any(&self) -> Box<dyn Any + Send> {
        Box::new(ObservableList::previous_value(self).to_vec())
    }

    fn persisted_value(&self) -> Result<Value, ValueError> {
        self.with_items(|items| encode_exact::<Vec<T>, _>(items))
    }

    fn assign_value(&self, value: Value) -> Result<(), ValueError> {
        let items: Vec<T> = decode(value)?;
        self.set_value(items);
        Ok(())
    }

    fn force_notify(&self) {
        ObservableList::force_notify(self);
    }

    fn subscribe_dyn(&self, handler: DynHandler, subscriber: Option<SubscriberId>) -> HandlerId {
        self.inner.on_value_changed.add(
            Arc::new(move |list: &ObservableList<T>| handler(list)),
            subscriber,
        )
    }

    fn unsubscribe(&self, id: HandlerId) -> bool {
        ObservableList::unsubscribe(self, id)
    }

    fn handler_count(&self) -> usize {
        ObservableList::handler_count(self)
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

impl<T> ObservableField for ObservableList<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    const KIND: ObservableKind = ObservableKind::List;

    fn value_type_name() -> &'static str {
        std::any::type_name::<Vec<T>>()
    }
}

impl<T> Clone for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T> Debug for ObservableList<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("ObservableList")
            .field("items", &state.items)
            .field("previous", &state.previous)
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
