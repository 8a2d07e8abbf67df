//! Binding Tables
//!
//! A subscriber declares which observable fields it reacts to, and which of
//! its widgets mirror a field, in [`Subscriber::declare`]. The declarations
//! form a [`BindingTable`], built once per subscriber type and cached.
//!
//! # Handler Arity
//!
//! Handlers come in three shapes, matching how much of the change they need:
//!
//! | Declared with | Arity | Receives |
//! |---|---|---|
//! | [`on_change`](BindingTable::on_change) | 0 | nothing |
//! | [`on_value`](BindingTable::on_value) | 1 | the new value |
//! | [`on_value_and_previous`](BindingTable::on_value_and_previous) | 2 | the new value, then the previous one |
//!
//! Typed handlers receive clones of the field's own values. The binding
//! engine checks the declared type against the field before registering them.
//!
//! [`on_change_dynamic`](BindingTable::on_change_dynamic) registers a handler
//! with an explicit arity that receives raw dynamic arguments. An arity above
//! two is a configuration error reported when the table is bound.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use super::adapter::UiComponent;
use crate::error::ValueError;
use crate::model::{get_or_build, DataModel};
use crate::reactive::{downcast_value, DynObservable, SubscriberId};

/// Anything that registers handlers against a model: presenters, game logic,
/// debug overlays.
pub trait Subscriber: Send + Sync + Sized + 'static {
    type Model: DataModel;

    /// Identity under which this subscriber's registrations are recorded.
    fn subscriber_id(&self) -> SubscriberId;

    /// The model this subscriber binds to, if it currently has one.
    fn model(&self) -> Option<Arc<Self::Model>>;

    /// Declare handlers and UI bindings. Called once per type.
    fn declare(table: &mut BindingTable<Self>);
}

pub(crate) type HandlerCall<S> = Arc<dyn Fn(&S, &dyn DynObservable) -> Result<(), ValueError> + Send + Sync>;

/// One per-field change handler.
pub struct HandlerMethod<S> {
    /// Observable field the handler listens to.
    pub field: &'static str,
    /// Name used in diagnostics.
    pub method: &'static str,
    pub arity: usize,
    /// Rust type the handler expects, for typed handlers.
    pub param_type: Option<&'static str>,
    pub(crate) call: HandlerCall<S>,
}

impl<S> fmt::Debug for HandlerMethod<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("field", &self.field)
            .field("method", &self.method)
            .field("arity", &self.arity)
            .field("param_type", &self.param_type)
            .finish()
    }
}

pub(crate) type ComponentGetter<S> = Arc<dyn Fn(&S) -> Arc<dyn UiComponent> + Send + Sync>;

/// One auto-bound widget.
pub struct UiBinding<S> {
    /// Name of the widget member on the subscriber.
    pub member: &'static str,
    /// Observable field the widget mirrors.
    pub target: &'static str,
    pub(crate) component: ComponentGetter<S>,
}

impl<S> fmt::Debug for UiBinding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiBinding")
            .field("member", &self.member)
            .field("target", &self.target)
            .finish()
    }
}

/// Declared handlers and UI bindings of one subscriber type.
pub struct BindingTable<S> {
    handlers: Vec<HandlerMethod<S>>,
    ui: Vec<UiBinding<S>>,
}

impl<S: 'static> BindingTable<S> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            ui: Vec::new(),
        }
    }

    /// Handler that only needs to know that `field` changed.
    pub fn on_change<F>(&mut self, field: &'static str, method: &'static str, handler: F) -> &mut Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.push_handler(HandlerMethod {
            field,
            method,
            arity: 0,
            param_type: None,
            call: Arc::new(move |subscriber: &S, _: &dyn DynObservable| -> Result<(), ValueError> {
                handler(subscriber);
                Ok(())
            }),
        })
    }

    /// Handler receiving the new value. `T` is the field's value type
    /// (`Vec<T>` for lists).
    pub fn on_value<T, F>(&mut self, field: &'static str, method: &'static str, handler: F) -> &mut Self
    where
        T: 'static,
        F: Fn(&S, T) + Send + Sync + 'static,
    {
        self.push_handler(HandlerMethod {
            field,
            method,
            arity: 1,
            param_type: Some(std::any::type_name::<T>()),
            call: Arc::new(move |subscriber: &S, field: &dyn DynObservable| -> Result<(), ValueError> {
                let value = downcast_value::<T>(field.current_any(), field.value_type())?;
                handler(subscriber, value);
                Ok(())
            }),
        })
    }

    /// Handler receiving the new value and the previous one, in that order.
    pub fn on_value_and_previous<T, F>(
        &mut self,
        field: &'static str,
        method: &'static str,
        handler: F,
    ) -> &mut Self
    where
        T: 'static,
        F: Fn(&S, T, T) + Send + Sync + 'static,
    {
        self.push_handler(HandlerMethod {
            field,
            method,
            arity: 2,
            param_type: Some(std::any::type_name::<T>()),
            call: Arc::new(move |subscriber: &S, field: &dyn DynObservable| -> Result<(), ValueError> {
                let value = downcast_value::<T>(field.current_any(), field.value_type())?;
                let previous = downcast_value::<T>(field.previous_any(), field.value_type())?;
                handler(subscriber, value, previous);
                Ok(())
            }),
        })
    }

    /// Handler with an explicit arity, receiving `arity` dynamic arguments.
    ///
    /// Arities above two are accepted here and rejected when the table is
    /// bound.
    pub fn on_change_dynamic<F>(
        &mut self,
        field: &'static str,
        method: &'static str,
        arity: usize,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&S, &[Value]) + Send + Sync + 'static,
    {
        self.push_handler(HandlerMethod {
            field,
            method,
            arity,
            param_type: None,
            call: Arc::new(move |subscriber: &S, field: &dyn DynObservable| -> Result<(), ValueError> {
                let args = dynamic_args(field, arity)?;
                handler(subscriber, args.as_slice());
                Ok(())
            }),
        })
    }

    /// Mirror the observable field `target` (default: `member`) in a widget.
    pub fn auto_bind<W, F>(&mut self, member: &'static str, target: Option<&'static str>, component: F) -> &mut Self
    where
        W: UiComponent,
        F: Fn(&S) -> Arc<W> + Send + Sync + 'static,
    {
        if self.ui.iter().any(|binding| binding.member == member) {
            tracing::warn!(
                subscriber = std::any::type_name::<S>(),
                member,
                "duplicate auto-bind declaration ignored"
            );
            return self;
        }

        self.ui.push(UiBinding {
            member,
            target: target.unwrap_or(member),
            component: Arc::new(move |subscriber: &S| -> Arc<dyn UiComponent> { component(subscriber) }),
        });
        self
    }

    fn push_handler(&mut self, handler: HandlerMethod<S>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(&self) -> &[HandlerMethod<S>] {
        &self.handlers
    }

    pub fn ui_bindings(&self) -> &[UiBinding<S>] {
        &self.ui
    }

    /// Whether any handler or UI binding targets `field`. Declarations that
    /// are later rejected at bind time still count here.
    pub fn targets(&self, field: &str) -> bool {
        self.handlers.iter().any(|h| h.field == field) || self.ui.iter().any(|b| b.target == field)
    }
}

impl<S: Subscriber> BindingTable<S> {
    /// The process-wide table for `S`, built on first use.
    pub fn cached() -> Arc<Self> {
        get_or_build(|| {
            let mut table = Self::new();
            S::declare(&mut table);
            tracing::debug!(
                subscriber = std::any::type_name::<S>(),
                handlers = table.handlers.len(),
                ui_bindings = table.ui.len(),
                "built binding table"
            );
            table
        })
    }
}

impl<S: 'static> Default for BindingTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for BindingTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("handlers", &self.handlers)
            .field("ui", &self.ui)
            .finish()
    }
}

/// Dynamic arguments for a handler of the given arity: nothing, the value,
/// or the value followed by the previous value.
pub(crate) fn dynamic_args(field: &dyn DynObservable, arity: usize) -> Result<SmallVec<[Value; 2]>, ValueError> {
    let mut args = SmallVec::new();
    if arity >= 1 {
        args.push(field.current_value()?);
    }
    if arity >= 2 {
        args.push(field.previous_value()?);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ObservableList, ObservableVariable};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::any::Any;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    struct Label;
    impl UiComponent for Label {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn sample_table() -> BindingTable<Recorder> {
        let mut table = BindingTable::new();
        table
            .on_change("health", "refresh", |r: &Recorder| r.calls.lock().push("refresh".into()))
            .on_value("health", "show", |r: &Recorder, hp: i32| {
                r.calls.lock().push(format!("show {hp}"))
            })
            .on_value_and_previous("health", "diff", |r: &Recorder, hp: i32, old: i32| {
                r.calls.lock().push(format!("diff {old}->{hp}"))
            })
            .on_change_dynamic("health", "raw", 3, |r: &Recorder, args: &[Value]| {
                r.calls.lock().push(format!("raw {}", args.len()))
            })
            .auto_bind("name_label", Some("name"), |_: &Recorder| Arc::new(Label))
            .auto_bind("title", None, |_: &Recorder| Arc::new(Label));
        table
    }

    #[test]
    fn declarations_keep_arity_and_types() {
        let table = sample_table();
        let arities: Vec<_> = table.handlers().iter().map(|h| (h.method, h.arity)).collect();
        assert_eq!(arities, vec![("refresh", 0), ("show", 1), ("diff", 2), ("raw", 3)]);
        assert_eq!(table.handlers()[1].param_type, Some(std::any::type_name::<i32>()));
        assert_eq!(table.handlers()[3].param_type, None);
    }

    #[test]
    fn auto_bind_target_defaults_to_member_name() {
        let table = sample_table();
        let targets: Vec<_> = table.ui_bindings().iter().map(|b| (b.member, b.target)).collect();
        assert_eq!(targets, vec![("name_label", "name"), ("title", "title")]);

        assert!(table.targets("name"));
        assert!(table.targets("health"));
        assert!(!table.targets("name_label"));
    }

    #[test]
    fn calls_adapt_arguments() {
        let table = sample_table();
        let recorder = Recorder::default();
        let health = ObservableVariable::new(100);
        health.set_value(80);

        for handler in table.handlers() {
            (handler.call)(&recorder, &health).unwrap();
        }

        assert_eq!(
            *recorder.calls.lock(),
            vec!["refresh", "show 80", "diff 100->80", "raw 2"]
        );
    }

    #[test]
    fn typed_handler_rejects_other_value_type() {
        let table = sample_table();
        let recorder = Recorder::default();
        let health = ObservableVariable::new("eighty".to_string());
        let err = (table.handlers()[1].call)(&recorder, &health).unwrap_err();
        assert!(matches!(err, ValueError::WrongType { .. }));
        assert!(recorder.calls.lock().is_empty());
    }

    #[test]
    fn typed_handlers_see_non_finite_floats() {
        let seen = Mutex::new(Vec::new());
        let mut table = BindingTable::<Mutex<Vec<(f64, f64)>>>::new();
        table.on_value_and_previous("speed", "on_speed", |log: &Mutex<Vec<(f64, f64)>>, new: f64, old: f64| {
            log.lock().push((new, old))
        });

        let speed = ObservableVariable::new(1.5);
        speed.set_value(f64::INFINITY);
        (table.handlers()[0].call)(&seen, &speed).unwrap();
        speed.set_value(f64::NAN);
        (table.handlers()[0].call)(&seen, &speed).unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0], (f64::INFINITY, 1.5));
        assert!(seen[1].0.is_nan());
        assert_eq!(seen[1].1, f64::INFINITY);
    }

    #[test]
    fn list_handlers_take_the_vec_type() {
        let mut table = BindingTable::<Recorder>::new();
        table.on_value("perks", "on_perks", |r: &Recorder, perks: Vec<String>| {
            r.calls.lock().push(perks.join(","))
        });
        assert_eq!(table.handlers()[0].param_type, Some(std::any::type_name::<Vec<String>>()));

        let recorder = Recorder::default();
        let perks = ObservableList::from_vec(vec!["dash".to_string()]);
        perks.push("roll".into());
        (table.handlers()[0].call)(&recorder, &perks).unwrap();
        assert_eq!(*recorder.calls.lock(), vec!["dash,roll"]);
    }

    #[test]
    fn dynamic_args_follow_arity() {
        let level = ObservableVariable::new(1u32);
        level.set_value(2);

        assert!(dynamic_args(&level, 0).unwrap().is_empty());
        assert_eq!(dynamic_args(&level, 1).unwrap().as_slice(), &[json!(2)]);
        assert_eq!(dynamic_args(&level, 2).unwrap().as_slice(), &[json!(2), json!(1)]);
        assert_eq!(dynamic_args(&level, 3).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_auto_bind_is_ignored() {
        let mut table = BindingTable::<Recorder>::new();
        table
            .auto_bind("label", None, |_: &Recorder| Arc::new(Label))
            .auto_bind("label", Some("other"), |_: &Recorder| Arc::new(Label));
        assert_eq!(table.ui_bindings().len(), 1);
        assert_eq!(table.ui_bindings()[0].target, "label");
    }
}
