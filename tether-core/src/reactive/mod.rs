//! Reactive Primitives
//!
//! This module implements the push-based half of Tether: tracked actions and
//! the two observable field types built on top of them.
//!
//! # Concepts
//!
//! ## Tracked Actions
//!
//! A [`TrackedAction`] is a multicast callback list. Registration is
//! idempotent, reentrant invocation is coalesced into extra passes, and a
//! panicking handler never stops the others.
//!
//! ## Observable Variables
//!
//! An [`ObservableVariable`] holds one value plus the value it held before the
//! last write. Every write notifies; there is no equality check.
//!
//! ## Observable Lists
//!
//! An [`ObservableList`] snapshots its items before each structural mutation,
//! so handlers can compare the previous and current sequence.
//!
//! # Implementation Notes
//!
//! Unlike pull-based signals there is no dependency tracking here. Handlers are
//! registered explicitly, normally by the binding engine, and receive the field
//! itself as payload. The erased [`DynObservable`] view lets the engine work
//! with fields whose value type it does not know.

mod action;
mod dynamic;
mod list;
mod subscriber;
mod thread;
mod variable;

pub use action::{Handler, HandlerId, TrackedAction};
pub(crate) use action::ActionControl;
pub use dynamic::{DynHandler, DynObservable, ObservableField, ObservableKind};
pub(crate) use dynamic::{decode, downcast_value, encode_exact};
pub use list::ObservableList;
pub use subscriber::SubscriberId;
pub use thread::ThreadGuard;
pub use variable::ObservableVariable;
