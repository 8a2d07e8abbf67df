//! Data Models
//!
//! A data model is a plain Rust struct that owns observable fields, ordinary
//! fields, and a [`ModelCore`]. It implements [`DataModel`] by exposing its
//! core and describing its members once:
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Player {
//!     core: ModelCore,
//!     health: ObservableVariable<i32>,
//!     inventory: ObservableList<String>,
//!     name: String,
//! }
//!
//! impl DataModel for Player {
//!     fn core(&self) -> &ModelCore {
//!         &self.core
//!     }
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .observable("health", |m: &Self| &m.health)
//!             .observable("inventory", |m: &Self| &m.inventory)
//!             .field("name", |m: &Self| &m.name, |m: &mut Self| &mut m.name);
//!     }
//! }
//! ```
//!
//! # Lifecycle
//!
//! 1. The model is constructed with its fields already in place.
//! 2. [`DataModel::ensure_fields_initialized`] links every observable field
//!    back to the model's ledger. It can run any number of times and never
//!    touches field values.
//! 3. Subscribers register handlers, recorded per subscriber in the ledger.
//! 4. Teardown removes every recorded handler and UI listener exactly once,
//!    either explicitly through [`DataModel::teardown`] or when the
//!    [`ModelCore`] is dropped.

mod cache;
mod id;
mod ledger;
mod schema;
mod snapshot;

pub use id::ModelId;
pub(crate) use ledger::{DelegateEntry, UiListenerEntry};
pub use ledger::{ParentLink, RemovalStats, SubscriptionLedger};
pub(crate) use cache::get_or_build;
pub use schema::{FieldInfo, MemberKind, ModelSchema, SchemaBuilder};
pub use snapshot::{LoadReport, SkipReason, SkippedMember, Snapshot};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::reactive::DynObservable;

/// Per-instance state every model carries: identity and subscription ledger.
pub struct ModelCore {
    id: ModelId,
    ledger: Arc<SubscriptionLedger>,
    torn_down: AtomicBool,
}

impl ModelCore {
    pub fn new() -> Self {
        let id = ModelId::new();
        Self {
            id,
            ledger: SubscriptionLedger::new(id),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn ledger(&self) -> &Arc<SubscriptionLedger> {
        &self.ledger
    }

    pub(crate) fn link(&self, model_type: &'static str) -> ParentLink {
        ParentLink::new(self.id, model_type, &self.ledger)
    }

    /// Remove every subscription recorded against this model. Only the first
    /// call does anything.
    pub fn teardown(&self) -> RemovalStats {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return RemovalStats::default();
        }
        tracing::debug!(model = %self.id, "tearing down model");
        self.ledger.cleanup()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl Default for ModelCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ModelCore {
    fn drop(&mut self) {
        if self.is_torn_down() {
            // Registrations made after an explicit teardown.
            self.ledger.cleanup();
        } else {
            self.teardown();
        }
    }
}

impl fmt::Debug for ModelCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCore")
            .field("id", &self.id)
            .field("torn_down", &self.is_torn_down())
            .field("ledger", &self.ledger)
            .finish()
    }
}

/// A component that owns observable state.
pub trait DataModel: Send + Sync + Sized + 'static {
    fn core(&self) -> &ModelCore;

    /// List the model's members. Called once per type.
    fn describe(schema: &mut SchemaBuilder<Self>);

    fn schema() -> Arc<ModelSchema<Self>> {
        ModelSchema::cached()
    }

    /// Observable members of this model type, computed once and shared.
    fn cached_observable_fields() -> Arc<[FieldInfo]> {
        Self::schema().observable_fields()
    }

    fn model_id(&self) -> ModelId {
        self.core().id()
    }

    /// Look up an observable field by name.
    fn observable(&self, name: &str) -> Option<&dyn DynObservable> {
        Self::schema().observable(self, name)
    }

    /// Link every observable field to this model.
    fn ensure_fields_initialized(&self) {
        self.ensure_fields_initialized_with(None);
    }

    /// Like [`ensure_fields_initialized`](Self::ensure_fields_initialized),
    /// also applying `dispatch` to every field.
    fn ensure_fields_initialized_with(&self, dispatch: Option<DispatchConfig>) {
        let schema = Self::schema();
        let link = self.core().link(schema.model_type());

        for (name, field) in schema.observables(self) {
            let previous = field.attach(link.clone(), name);
            if let Some(previous) = previous.filter(|p| p.model() != link.model()) {
                tracing::warn!(
                    field = name,
                    model = %link.model(),
                    previous = %previous.model(),
                    "observable field moved to another model"
                );
            }
            if let Some(config) = dispatch {
                field.set_dispatch_config(config);
            }
        }
    }

    /// Copy every writable member present in `snapshot` onto this model.
    ///
    /// Observable members are assigned through their setter and notify their
    /// handlers. Failures are per member; see [`LoadReport`].
    fn load_data_from_model(&mut self, snapshot: &Snapshot) -> LoadReport {
        Self::schema().restore(self, snapshot)
    }

    /// Capture the model's current state for the host's save system.
    fn snapshot(&self) -> Snapshot {
        Self::schema().capture(self)
    }

    /// Remove every subscription recorded against this model.
    fn teardown(&self) -> RemovalStats {
        self.core().teardown()
    }
}
