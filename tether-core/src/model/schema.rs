//! Model Schemas
//!
//! A schema is the explicit, per-type description of a model's members. It
//! replaces runtime field discovery: each model type lists its members once
//! in [`DataModel::describe`](super::DataModel::describe), and the resulting
//! [`ModelSchema`] is cached for the lifetime of the process.
//!
//! # Member Kinds
//!
//! - **Observable** members are `ObservableVariable<T>` or `ObservableList<T>`
//!   fields. The binding engine resolves handler targets against them by
//!   name, and snapshot loading assigns their value through the normal setter.
//! - **Plain** members are ordinary serde-compatible fields. They take part in
//!   snapshots only.
//! - **Read-only** members are plain members that are saved but never
//!   restored.
//!
//! Member names are unique per model type. Declaring a name twice keeps the
//! first declaration.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::cache;
use super::DataModel;
use crate::error::ValueError;
use crate::reactive::{decode, encode_exact, DynObservable, ObservableField, ObservableKind};

/// What kind of member a schema entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Observable(ObservableKind),
    Plain,
}

/// Public description of one model member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub kind: MemberKind,
    /// Rust type name of the member's value (`Vec<T>` for lists).
    pub value_type: &'static str,
    pub read_only: bool,
}

impl FieldInfo {
    pub fn is_observable(&self) -> bool {
        matches!(self.kind, MemberKind::Observable(_))
    }
}

pub(crate) trait ObservableAccess<M>: Send + Sync {
    fn get<'a>(&self, model: &'a M) -> &'a dyn DynObservable;
}

struct ObservableAccessor<O, F> {
    get: F,
    _field: PhantomData<fn() -> O>,
}

impl<M, O, F> ObservableAccess<M> for ObservableAccessor<O, F>
where
    O: ObservableField,
    F: Fn(&M) -> &O + Send + Sync,
{
    fn get<'a>(&self, model: &'a M) -> &'a dyn DynObservable {
        (self.get)(model)
    }
}

pub(crate) trait PlainAccess<M>: Send + Sync {
    fn read(&self, model: &M) -> Result<Value, ValueError>;

    /// `None` for read-only members.
    fn write(&self, model: &mut M, value: Value) -> Option<Result<(), ValueError>>;
}

struct PlainAccessor<T, G, S> {
    get: G,
    get_mut: Option<S>,
    _value: PhantomData<fn() -> T>,
}

impl<M, T, G, S> PlainAccess<M> for PlainAccessor<T, G, S>
where
    T: Serialize + DeserializeOwned,
    G: Fn(&M) -> &T + Send + Sync,
    S: Fn(&mut M) -> &mut T + Send + Sync,
{
    fn read(&self, model: &M) -> Result<Value, ValueError> {
        encode_exact::<T, T>((self.get)(model))
    }

    fn write(&self, model: &mut M, value: Value) -> Option<Result<(), ValueError>> {
        let get_mut = self.get_mut.as_ref()?;
        Some(decode::<T>(value).map(|decoded| *get_mut(model) = decoded))
    }
}

pub(crate) enum Access<M> {
    Observable(Box<dyn ObservableAccess<M>>),
    Plain(Box<dyn PlainAccess<M>>),
}

pub(crate) struct Member<M> {
    pub(crate) info: FieldInfo,
    pub(crate) access: Access<M>,
}

/// Collects member declarations for one model type.
pub struct SchemaBuilder<M> {
    members: IndexMap<&'static str, Member<M>>,
}

impl<M: 'static> SchemaBuilder<M> {
    fn new() -> Self {
        Self {
            members: IndexMap::new(),
        }
    }

    /// Declare an observable field.
    ///
    /// ```rust,ignore
    /// schema.observable("health", |m: &Player| &m.health);
    /// ```
    pub fn observable<O, F>(&mut self, name: &'static str, get: F) -> &mut Self
    where
        O: ObservableField,
        F: Fn(&M) -> &O + Send + Sync + 'static,
    {
        self.push(Member {
            info: FieldInfo {
                name,
                kind: MemberKind::Observable(O::KIND),
                value_type: O::value_type_name(),
                read_only: false,
            },
            access: Access::Observable(Box::new(ObservableAccessor {
                get,
                _field: PhantomData,
            })),
        })
    }

    /// Declare a plain field that is saved and restored.
    pub fn field<T, G, S>(&mut self, name: &'static str, get: G, get_mut: S) -> &mut Self
    where
        T: Serialize + DeserializeOwned + 'static,
        G: Fn(&M) -> &T + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut T + Send + Sync + 'static,
    {
        self.push(Member {
            info: FieldInfo {
                name,
                kind: MemberKind::Plain,
                value_type: std::any::type_name::<T>(),
                read_only: false,
            },
            access: Access::Plain(Box::new(PlainAccessor {
                get,
                get_mut: Some(get_mut),
                _value: PhantomData,
            })),
        })
    }

    /// Declare a plain field that is saved but never restored.
    pub fn read_only<T, G>(&mut self, name: &'static str, get: G) -> &mut Self
    where
        T: Serialize + DeserializeOwned + 'static,
        G: Fn(&M) -> &T + Send + Sync + 'static,
    {
        self.push(Member {
            info: FieldInfo {
                name,
                kind: MemberKind::Plain,
                value_type: std::any::type_name::<T>(),
                read_only: true,
            },
            access: Access::Plain(Box::new(PlainAccessor::<T, G, fn(&mut M) -> &mut T> {
                get,
                get_mut: None,
                _value: PhantomData,
            })),
        })
    }

    fn push(&mut self, member: Member<M>) -> &mut Self {
        let name = member.info.name;
        if self.members.contains_key(name) {
            tracing::warn!(
                model = std::any::type_name::<M>(),
                field = name,
                "duplicate member declaration ignored"
            );
        } else {
            self.members.insert(name, member);
        }
        self
    }
}

/// Cached member table for a model type.
pub struct ModelSchema<M> {
    model_type: &'static str,
    pub(crate) members: IndexMap<&'static str, Member<M>>,
    observable_fields: Arc<[FieldInfo]>,
}

impl<M: DataModel> ModelSchema<M> {
    /// The process-wide schema for `M`, built on first use.
    pub fn cached() -> Arc<Self> {
        cache::get_or_build(Self::build)
    }

    fn build() -> Self {
        let mut builder = SchemaBuilder::new();
        M::describe(&mut builder);

        let observable_fields: Arc<[FieldInfo]> = builder
            .members
            .values()
            .filter(|member| member.info.is_observable())
            .map(|member| member.info.clone())
            .collect();

        tracing::debug!(
            model = std::any::type_name::<M>(),
            members = builder.members.len(),
            observables = observable_fields.len(),
            "built model schema"
        );

        Self {
            model_type: std::any::type_name::<M>(),
            members: builder.members,
            observable_fields,
        }
    }
}

impl<M> ModelSchema<M> {
    pub fn model_type(&self) -> &'static str {
        self.model_type
    }

    /// Every declared member in declaration order.
    pub fn members(&self) -> impl Iterator<Item = &FieldInfo> + '_ {
        self.members.values().map(|member| &member.info)
    }

    pub fn member(&self, name: &str) -> Option<&FieldInfo> {
        self.members.get(name).map(|member| &member.info)
    }

    /// Observable members in declaration order.
    pub fn observable_fields(&self) -> Arc<[FieldInfo]> {
        Arc::clone(&self.observable_fields)
    }

    /// Resolve an observable field on `model` by name.
    pub fn observable<'a>(&self, model: &'a M, name: &str) -> Option<&'a dyn DynObservable> {
        match &self.members.get(name)?.access {
            Access::Observable(access) => Some(access.get(model)),
            Access::Plain(_) => None,
        }
    }

    /// Every observable field on `model`, paired with its name.
    pub fn observables<'a>(
        &'a self,
        model: &'a M,
    ) -> impl Iterator<Item = (&'static str, &'a dyn DynObservable)> + 'a {
        self.members.values().filter_map(move |member| match &member.access {
            Access::Observable(access) => Some((member.info.name, access.get(model))),
            Access::Plain(_) => None,
        })
    }
}

impl<M> fmt::Debug for ModelSchema<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("model_type", &self.model_type)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
