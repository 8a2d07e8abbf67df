//! Tether Core
//!
//! This crate provides the reactive data-binding layer for component-based
//! game UI. It implements:
//!
//! - Observable fields (scalar variables and lists) with previous-value
//!   snapshots and reentrancy-safe change dispatch
//! - Data models that own those fields and release every subscription on
//!   teardown
//! - A binding engine that wires presenter handlers and UI widgets to model
//!   fields from declarative tables
//! - Save/load hooks through plain-data snapshots
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: tracked actions and the observable primitives
//! - `model`: the data model trait, schemas, subscription ledgers, snapshots
//! - `binding`: subscriber tables, the binding engine, UI adapters, roles
//! - `config`: dispatch and binding configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_core::prelude::*;
//!
//! #[derive(Default)]
//! struct Player {
//!     core: ModelCore,
//!     health: ObservableVariable<i32>,
//! }
//!
//! impl DataModel for Player {
//!     fn core(&self) -> &ModelCore {
//!         &self.core
//!     }
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema.observable("health", |m: &Self| &m.health);
//!     }
//! }
//!
//! struct HealthBar {
//!     id: SubscriberId,
//!     player: Arc<Player>,
//! }
//!
//! impl Subscriber for HealthBar {
//!     type Model = Player;
//!
//!     fn subscriber_id(&self) -> SubscriberId {
//!         self.id
//!     }
//!
//!     fn model(&self) -> Option<Arc<Player>> {
//!         Some(self.player.clone())
//!     }
//!
//!     fn declare(table: &mut BindingTable<Self>) {
//!         table.on_value_and_previous("health", "on_health", |_: &Self, hp: i32, old: i32| {
//!             println!("health {old} -> {hp}");
//!         });
//!     }
//! }
//!
//! let bindings = Bindings::default();
//! let player = Arc::new(Player::default());
//! let bar = Arc::new(HealthBar { id: SubscriberId::new(), player: player.clone() });
//!
//! bar.bind(&bindings);
//! player.health.set_value(80); // prints "health 0 -> 80"
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod model;
pub mod reactive;

pub use binding::{Bindings, BindingReport, BindingTable, Loader, Presenter, Subscriber};
pub use config::{BindingConfig, DispatchConfig, ThreadPolicy};
pub use error::{AdapterError, BindError, ListError, LoadError, ValueError};
pub use model::{DataModel, LoadReport, ModelCore, ModelId, SchemaBuilder, Snapshot};
pub use reactive::{ObservableList, ObservableVariable, SubscriberId, TrackedAction};

/// The types most applications need.
pub mod prelude {
    pub use crate::binding::{
        BindingTable, Bindings, Loader, Presenter, Subscriber, UiAdapter, UiComponent, UiType,
    };
    pub use crate::config::BindingConfig;
    pub use crate::model::{DataModel, ModelCore, SchemaBuilder, Snapshot};
    pub use crate::reactive::{DynObservable, ObservableList, ObservableVariable, SubscriberId};
}
