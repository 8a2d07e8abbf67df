//! Binding Engine
//!
//! [`Bindings`] wires a subscriber's declared handlers and widgets to the
//! observable fields of its model, and removes them again.
//!
//! # How Binding Works
//!
//! [`Bindings::set_listeners`] runs one pass per subscriber:
//!
//! 1. Resolve the subscriber's model. No model, or a torn-down one, nothing
//!    to do.
//! 2. Remove whatever this subscriber registered on the model before, so
//!    binding twice is the same as binding once.
//! 3. Link the model's fields to its ledger.
//! 4. Register one delegate per declared handler, adapting the arguments to
//!    the handler's arity.
//! 5. Connect every auto-bound widget: model to widget always, widget to
//!    model when an adapter supports listeners.
//! 6. Warn about observable fields that ended up with nothing attached.
//!
//! Configuration problems are logged, collected in the [`BindingReport`] and
//! skipped; the rest of the pass still runs.
//!
//! # Ownership
//!
//! Delegates hold the subscriber weakly and UI listeners hold the model
//! weakly, so a field's handler list never keeps either alive. Every
//! registration is recorded in the model's ledger under the subscriber's ID.

use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use super::adapter::{AdapterRegistry, UiAdapter, UiCallback, UiComponent, UiType};
use super::table::{BindingTable, HandlerMethod, Subscriber, UiBinding};
use crate::config::BindingConfig;
use crate::error::{BindError, ValueError};
use crate::model::{DataModel, ModelId, RemovalStats, UiListenerEntry};
use crate::reactive::{DynHandler, DynObservable, SubscriberId};

/// Outcome of one [`Bindings::set_listeners`] pass.
#[derive(Debug, Default)]
pub struct BindingReport {
    /// The model that was bound. `None` if the subscriber had no model or the
    /// model was already torn down.
    pub model: Option<ModelId>,
    pub handlers_bound: usize,
    /// Widgets receiving model updates.
    pub ui_bound: usize,
    /// Widgets that also write user edits back.
    pub two_way_bound: usize,
    /// Observable fields with neither a handler nor a widget.
    pub unbound_fields: Vec<&'static str>,
    pub diagnostics: Vec<BindError>,
    /// Registrations from an earlier pass that were replaced.
    pub replaced: RemovalStats,
}

impl BindingReport {
    /// `true` if every declared handler and widget was wired.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn is_bound(&self) -> bool {
        self.model.is_some()
    }
}

/// Binding context: the adapter registry plus configuration.
///
/// Contexts are independent of each other; nothing here is global.
#[derive(Debug, Default)]
pub struct Bindings {
    adapters: AdapterRegistry,
    config: BindingConfig,
}

impl Bindings {
    pub fn new(config: BindingConfig) -> Self {
        Self {
            adapters: AdapterRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Register a UI adapter. See [`AdapterRegistry::register`].
    pub fn register_adapter(&self, adapter: Arc<dyn UiAdapter>) -> bool {
        self.adapters.register(adapter)
    }

    /// Wire `subscriber` to its model. Calling this again replaces the
    /// previous wiring instead of adding to it.
    pub fn set_listeners<S: Subscriber>(&self, subscriber: &Arc<S>) -> BindingReport {
        let mut report = BindingReport::default();

        let Some(model) = subscriber.model() else {
            tracing::debug!(
                subscriber = std::any::type_name::<S>(),
                "subscriber has no model; nothing to bind"
            );
            return report;
        };

        let id = subscriber.subscriber_id();
        let core = model.core();
        let schema = S::Model::schema();

        // Nothing would remove registrations made after teardown.
        if core.is_torn_down() {
            tracing::warn!(
                model = %core.id(),
                %id,
                "model was already torn down; not binding"
            );
            report.diagnostics.push(BindError::TornDown {
                model: schema.model_type(),
                id: core.id(),
            });
            return report;
        }
        report.model = Some(core.id());

        report.replaced = core.ledger().remove_subscriber(id);
        model.ensure_fields_initialized_with(Some(self.config.dispatch));

        let table = BindingTable::<S>::cached();
        let mut attached: SmallVec<[&'static str; 8]> = SmallVec::new();

        for method in table.handlers() {
            match self.bind_handler(&model, subscriber, id, method) {
                Ok(()) => {
                    report.handlers_bound += 1;
                    attached.push(method.field);
                }
                Err(err) => report.diagnostics.push(err),
            }
        }

        for binding in table.ui_bindings() {
            match self.bind_ui(&model, subscriber, id, binding, &mut report.diagnostics) {
                Ok(two_way) => {
                    report.ui_bound += 1;
                    if two_way {
                        report.two_way_bound += 1;
                    }
                    attached.push(binding.target);
                }
                Err(err) => report.diagnostics.push(err),
            }
        }

        for info in schema.observable_fields().iter() {
            if attached.contains(&info.name) {
                continue;
            }
            if self.config.warn_unbound_fields {
                tracing::warn!(
                    model = schema.model_type(),
                    field = info.name,
                    subscriber = std::any::type_name::<S>(),
                    declared = table.targets(info.name),
                    "observable field has no handler and no UI binding"
                );
            }
            report.unbound_fields.push(info.name);
        }

        tracing::debug!(
            model = %core.id(),
            %id,
            handlers = report.handlers_bound,
            ui = report.ui_bound,
            two_way = report.two_way_bound,
            problems = report.diagnostics.len(),
            "listeners set"
        );
        report
    }

    fn bind_handler<S: Subscriber>(
        &self,
        model: &Arc<S::Model>,
        subscriber: &Arc<S>,
        id: SubscriberId,
        method: &HandlerMethod<S>,
    ) -> Result<(), BindError> {
        let model_type = S::Model::schema().model_type();

        if method.arity > 2 {
            let err = BindError::UnsupportedArity {
                method: method.method.to_string(),
                field: method.field.to_string(),
                arity: method.arity,
            };
            tracing::error!(
                model = model_type,
                field = method.field,
                method = method.method,
                arity = method.arity,
                "handler declares too many parameters; skipped"
            );
            return Err(err);
        }

        let Some(field) = model.observable(method.field) else {
            tracing::warn!(
                model = model_type,
                field = method.field,
                method = method.method,
                "handler targets an unknown observable field"
            );
            return Err(BindError::UnknownField {
                member: method.method.to_string(),
                field: method.field.to_string(),
                model: model_type,
            });
        };

        if let Some(expected) = method.param_type {
            if expected != field.value_type() {
                tracing::warn!(
                    model = model_type,
                    field = method.field,
                    method = method.method,
                    expected,
                    found = field.value_type(),
                    "handler parameter type does not match the field"
                );
                return Err(BindError::HandlerTypeMismatch {
                    method: method.method.to_string(),
                    field: method.field.to_string(),
                    expected,
                    found: field.value_type(),
                });
            }
        }

        let weak = Arc::downgrade(subscriber);
        let call = Arc::clone(&method.call);
        let (field_name, method_name) = (method.field, method.method);

        let delegate: DynHandler = Arc::new(move |field: &dyn DynObservable| {
            let Some(subscriber) = weak.upgrade() else {
                return;
            };
            if let Err(err) = call(subscriber.as_ref(), field) {
                tracing::error!(
                    field = field_name,
                    method = method_name,
                    error = %err,
                    "handler arguments could not be prepared"
                );
            }
        });

        field.subscribe_dyn(delegate, Some(id));
        Ok(())
    }

    /// Returns whether the binding is two-way. Failures of the initial push
    /// are recorded in `diagnostics` without failing the binding.
    fn bind_ui<S: Subscriber>(
        &self,
        model: &Arc<S::Model>,
        subscriber: &Arc<S>,
        id: SubscriberId,
        binding: &UiBinding<S>,
        diagnostics: &mut Vec<BindError>,
    ) -> Result<bool, BindError> {
        let model_type = S::Model::schema().model_type();

        let Some(field) = model.observable(binding.target) else {
            tracing::warn!(
                model = model_type,
                field = binding.target,
                member = binding.member,
                "auto-bind targets an unknown observable field"
            );
            return Err(BindError::UnknownField {
                member: binding.member.to_string(),
                field: binding.target.to_string(),
                model: model_type,
            });
        };

        let component = (binding.component)(subscriber.as_ref());
        let ui_type = UiType::of_component(component.as_ref());

        let Some(adapter) = self.adapters.adapter_for(&ui_type) else {
            tracing::warn!(
                field = binding.target,
                member = binding.member,
                ui_type = ui_type.name(),
                "no UI adapter for component"
            );
            return Err(BindError::NoAdapter {
                member: binding.member.to_string(),
                field: binding.target.to_string(),
                ui_type: ui_type.name(),
            });
        };

        // Model -> UI.
        let target = binding.target;
        let weak_component = Arc::downgrade(&component);
        let display_adapter = Arc::clone(&adapter);
        let push: DynHandler = Arc::new(move |field: &dyn DynObservable| {
            let Some(component) = weak_component.upgrade() else {
                return;
            };
            if let Err(err) = push_value(display_adapter.as_ref(), component.as_ref(), field) {
                tracing::error!(
                    field = target,
                    adapter = display_adapter.name(),
                    error = %err,
                    "failed to update UI component"
                );
            }
        });
        field.subscribe_dyn(push, Some(id));

        if self.config.sync_ui_on_bind {
            if let Err(err) = push_value(adapter.as_ref(), component.as_ref(), field) {
                tracing::warn!(
                    field = target,
                    adapter = adapter.name(),
                    error = %err,
                    "initial UI sync failed"
                );
                diagnostics.push(err);
            }
        }

        // UI -> model.
        let Some(listener) = self.adapters.listener_adapter_for(&ui_type) else {
            return Ok(false);
        };

        let weak_model = Arc::downgrade(model);
        let on_change: UiCallback = Arc::new(move |raw: Value| {
            let Some(model) = weak_model.upgrade() else {
                return;
            };
            let Some(field) = model.observable(target) else {
                return;
            };
            if let Err(err) = assign_from_ui(field, raw) {
                tracing::warn!(field = target, error = %err, "UI value rejected");
            }
        });

        let token = match listener.add_listener(component.as_ref(), on_change, field.value_type()) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(
                    field = target,
                    member = binding.member,
                    adapter = listener.name(),
                    error = %err,
                    "UI listener refused; binding stays one-way"
                );
                diagnostics.push(err.into());
                return Ok(false);
            }
        };
        model.core().ledger().record_ui_listener(
            id,
            UiListenerEntry {
                field: target,
                component,
                adapter: listener,
                token,
            },
        );
        Ok(true)
    }

    /// Remove everything `subscriber` registered on `model`.
    pub fn remove_all_subscriptions<M: DataModel>(&self, model: &M, subscriber: SubscriberId) -> RemovalStats {
        model.core().ledger().remove_subscriber(subscriber)
    }

    /// Remove everything every subscriber registered on `model`.
    ///
    /// Unlike [`DataModel::teardown`], the model can be bound again
    /// afterwards.
    pub fn cleanup_subscriptions<M: DataModel>(&self, model: &M) -> RemovalStats {
        model.core().ledger().cleanup()
    }
}

fn push_value(
    adapter: &dyn UiAdapter,
    component: &dyn UiComponent,
    field: &dyn DynObservable,
) -> Result<(), BindError> {
    let value = field.current_value()?;
    adapter.set_value(component, &value, field.value_type())?;
    Ok(())
}

/// Assign a raw UI value, accepting text that parses as the field's type
/// (`"42"` for an integer field).
fn assign_from_ui(field: &dyn DynObservable, raw: Value) -> Result<(), ValueError> {
    let reparsed = match &raw {
        Value::String(text) => serde_json::from_str::<Value>(text.trim()).ok(),
        _ => None,
    };

    match (field.assign_value(raw), reparsed) {
        (Err(_), Some(parsed)) => field.assign_value(parsed),
        (outcome, _) => outcome,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
