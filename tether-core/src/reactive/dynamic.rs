//! Type-erased view of observable fields.
//!
//! The binding engine, the model schema and snapshot loading all work with
//! fields whose value type is only known to the model that declared them.
//! [`DynObservable`] is the object-safe surface they share; values cross it as
//! [`serde_json::Value`].

use std::any::Any;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{HandlerId, SubscriberId};
use crate::config::DispatchConfig;
use crate::error::{describe_value, ValueError};
use crate::model::ParentLink;

/// Which observable primitive backs a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservableKind {
    Variable,
    List,
}

/// Handler registered through the erased interface.
pub type DynHandler = Arc<dyn Fn(&dyn DynObservable) + Send + Sync>;

/// Object-safe interface implemented by [`ObservableVariable`] and
/// [`ObservableList`].
///
/// [`ObservableVariable`]: super::ObservableVariable
/// [`ObservableList`]: super::ObservableList
pub trait DynObservable: Send + Sync {
    fn kind(&self) -> ObservableKind;

    /// Rust type name of the field's value (`Vec<T>` for lists).
    fn value_type(&self) -> &'static str;

    fn current_value(&self) -> Result<Value, ValueError>;

    fn previous_value(&self) -> Result<Value, ValueError>;

    /// Clone of the current value, boxed as the field's value type (`Vec<T>`
    /// for lists). Typed handlers read this instead of the dynamic form.
    fn current_any(&self) -> Box<dyn Any + Send>;

    fn previous_any(&self) -> Box<dyn Any + Send>;

    /// Current value as it should be saved. Unlike
    /// [`current_value`](Self::current_value) this fails when the dynamic
    /// form would not restore to the same value.
    fn persisted_value(&self) -> Result<Value, ValueError>;

    /// Decode `value` and assign it through the normal setter, which notifies
    /// handlers. On a decode failure the field is left untouched.
    fn assign_value(&self, value: Value) -> Result<(), ValueError>;

    fn force_notify(&self);

    /// Register a handler that receives the field itself.
    fn subscribe_dyn(&self, handler: DynHandler, subscriber: Option<SubscriberId>) -> HandlerId;

    fn unsubscribe(&self, id: HandlerId) -> bool;

    fn handler_count(&self) -> usize;

    /// Link to the owning model, once attached.
    fn parent(&self) -> Option<ParentLink>;

    /// Attach the field to a model. Returns the previous link.
    #[doc(hidden)]
    fn attach(&self, link: ParentLink, label: &'static str) -> Option<ParentLink>;

    #[doc(hidden)]
    fn set_dispatch_config(&self, config: DispatchConfig);
}

/// Static facts about an observable type, used when a model schema is built.
pub trait ObservableField: DynObservable + Sized + 'static {
    const KIND: ObservableKind;

    fn value_type_name() -> &'static str;
}

pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, ValueError> {
    serde_json::to_value(value).map_err(|source| ValueError::Encode {
        ty: std::any::type_name::<T>(),
        source,
    })
}

/// Encode `value` and check that the result decodes back as `O`.
pub(crate) fn encode_exact<O, T>(value: &T) -> Result<Value, ValueError>
where
    O: DeserializeOwned,
    T: Serialize + ?Sized,
{
    let encoded = encode(value)?;
    match serde_json::from_value::<O>(encoded.clone()) {
        Ok(_) => Ok(encoded),
        Err(source) => Err(ValueError::Unrepresentable {
            ty: std::any::type_name::<O>(),
            source,
        }),
    }
}

/// Unbox a value produced by [`DynObservable::current_any`].
pub(crate) fn downcast_value<T: 'static>(value: Box<dyn Any + Send>, found: &'static str) -> Result<T, ValueError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| ValueError::WrongType {
            expected: std::any::type_name::<T>(),
            found,
        })
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ValueError> {
    let found = describe_value(&value);
    serde_json::from_value(value).map_err(|source| ValueError::Decode {
        expected: std::any::type_name::<T>(),
        found,
        source,
    })
}
