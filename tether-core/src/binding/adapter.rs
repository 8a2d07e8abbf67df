//! UI Adapters
//!
//! The binding engine never talks to widget libraries directly. Widgets are
//! opaque [`UiComponent`] values, and an [`AdapterRegistry`] maps their
//! concrete type to a [`UiAdapter`] that knows how to push a value into them
//! and, optionally, how to listen for user edits coming back out.
//!
//! # Priority
//!
//! Adapters are kept sorted by descending [`UiAdapter::priority`], so a
//! specific adapter ("interactive text field") wins over a general one
//! ("anything that shows text") when both can handle a type. Adapters of equal
//! priority keep their registration order.
//!
//! # Caching
//!
//! Lookups are cached per concrete `TypeId`, including negative results.
//! Registering another adapter drops the caches.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::AdapterError;

/// A widget the binding engine can drive through an adapter.
///
/// Implementations are usually a one-liner:
///
/// ```rust,ignore
/// impl UiComponent for Label {
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait UiComponent: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    /// Type name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Runtime type of a UI component, as seen by adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiType {
    id: TypeId,
    name: &'static str,
}

impl UiType {
    pub fn of<W: UiComponent>() -> Self {
        Self {
            id: TypeId::of::<W>(),
            name: std::any::type_name::<W>(),
        }
    }

    /// The concrete type behind a component reference.
    pub fn of_component(component: &dyn UiComponent) -> Self {
        Self {
            id: component.as_any().type_id(),
            name: component.type_name(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<W: UiComponent>(&self) -> bool {
        self.id == TypeId::of::<W>()
    }
}

/// Callback handed to [`UiAdapter::add_listener`]. The adapter calls it with
/// the raw value the user entered.
pub type UiCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Opaque handle returned by [`UiAdapter::add_listener`].
///
/// Only the adapter that created a token knows what is inside; passing it back
/// to that adapter's [`UiAdapter::remove_listener`] detaches the listener.
pub struct ListenerToken(Box<dyn Any + Send + Sync>);

impl ListenerToken {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Box::new(inner))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Recover the adapter-defined payload.
    pub fn into_inner<T: Any>(self) -> Result<T, Self> {
        match self.0.downcast::<T>() {
            Ok(inner) => Ok(*inner),
            Err(other) => Err(Self(other)),
        }
    }
}

impl fmt::Debug for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ListenerToken(..)")
    }
}

/// Strategy translating between one family of widgets and dynamic values.
pub trait UiAdapter: Send + Sync {
    /// Unique name; the registry refuses a second adapter with the same name.
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn can_handle(&self, ui_type: &UiType) -> bool;

    /// Push a value into the widget. `value_type` is the Rust type name of
    /// the bound field.
    fn set_value(
        &self,
        component: &dyn UiComponent,
        value: &Value,
        value_type: &'static str,
    ) -> Result<(), AdapterError>;

    /// Whether this adapter implements the two-way contract below.
    fn supports_listener(&self) -> bool {
        false
    }

    /// Start forwarding user edits to `on_change`.
    ///
    /// Adapters should not report a value that equals what the widget
    /// currently displays; the engine relies on that to stop model→UI→model
    /// round trips.
    fn add_listener(
        &self,
        component: &dyn UiComponent,
        on_change: UiCallback,
        value_type: &'static str,
    ) -> Result<ListenerToken, AdapterError> {
        let _ = (component, on_change, value_type);
        Err(AdapterError::ListenerUnsupported {
            adapter: self.name(),
        })
    }

    /// Detach a listener created by [`add_listener`](Self::add_listener).
    fn remove_listener(&self, component: &dyn UiComponent, token: ListenerToken) {
        let _ = (component, token);
    }
}

type Cache = DashMap<TypeId, Option<Arc<dyn UiAdapter>>>;

/// Priority-ordered adapter lookup.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn UiAdapter>>>,
    display_cache: Cache,
    listener_cache: Cache,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. Returns `false` if one with the same name is already
    /// registered.
    pub fn register(&self, adapter: Arc<dyn UiAdapter>) -> bool {
        {
            let mut adapters = self.adapters.write();
            if adapters.iter().any(|a| a.name() == adapter.name()) {
                tracing::debug!(adapter = adapter.name(), "adapter already registered");
                return false;
            }

            tracing::debug!(
                adapter = adapter.name(),
                priority = adapter.priority(),
                "registering UI adapter"
            );
            adapters.push(adapter);
            adapters.sort_by_key(|a| std::cmp::Reverse(a.priority()));
        }

        self.display_cache.clear();
        self.listener_cache.clear();
        true
    }

    /// Highest-priority adapter that can display `ui_type`.
    pub fn adapter_for(&self, ui_type: &UiType) -> Option<Arc<dyn UiAdapter>> {
        self.lookup(&self.display_cache, ui_type, false)
    }

    /// Highest-priority adapter that can handle `ui_type` and supports
    /// listeners.
    pub fn listener_adapter_for(&self, ui_type: &UiType) -> Option<Arc<dyn UiAdapter>> {
        self.lookup(&self.listener_cache, ui_type, true)
    }

    fn lookup(&self, cache: &Cache, ui_type: &UiType, listener: bool) -> Option<Arc<dyn UiAdapter>> {
        if let Some(hit) = cache.get(&ui_type.id()) {
            return hit.value().clone();
        }

        let found = self
            .adapters
            .read()
            .iter()
            .find(|a| a.can_handle(ui_type) && (!listener || a.supports_listener()))
            .cloned();

        tracing::trace!(
            ui_type = ui_type.name(),
            listener,
            adapter = found.as_ref().map(|a| a.name()),
            "resolved UI adapter"
        );
        cache.insert(ui_type.id(), found.clone());
        found
    }

    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    /// Adapter names in lookup order.
    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.read().iter().map(|a| a.name()).collect()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}
