//! Error types.
//!
//! Binding and loading are best-effort passes: the errors below are collected
//! into [`BindingReport`](crate::binding::BindingReport) and
//! [`LoadReport`](crate::model::LoadReport) and logged, never raised out of
//! the pass itself. Single-item operations (list indexing, value conversion,
//! adapter calls) return them directly.

use thiserror::Error;

use crate::model::ModelId;

/// Failure converting between a typed observable value and its dynamic
/// [`serde_json::Value`] form.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The typed value could not be encoded.
    #[error("cannot encode value of type `{ty}`: {source}")]
    Encode {
        ty: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A dynamic value did not fit the expected type.
    #[error("cannot convert {found} into `{expected}`: {source}")]
    Decode {
        expected: &'static str,
        found: String,
        #[source]
        source: serde_json::Error,
    },

    /// The encoded form does not decode back; serde_json writes non-finite
    /// floats as `null`.
    #[error("value of type `{ty}` has no faithful dynamic form: {source}")]
    Unrepresentable {
        ty: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A typed read asked for a type the field does not hold.
    #[error("field holds `{found}`, not `{expected}`")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors from structural list mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("index {index} is out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Errors reported by UI adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter was handed a component it does not understand.
    #[error("adapter `{adapter}` cannot drive UI component `{ui_type}`")]
    WrongComponent {
        adapter: &'static str,
        ui_type: &'static str,
    },

    /// The adapter has no two-way support.
    #[error("adapter `{adapter}` does not support listeners")]
    ListenerUnsupported { adapter: &'static str },

    /// The widget refused the value.
    #[error("adapter `{adapter}` rejected value: {reason}")]
    Rejected {
        adapter: &'static str,
        reason: String,
    },
}

/// Configuration and wiring problems found during a binding pass.
#[derive(Debug, Error)]
pub enum BindError {
    /// An observable field has neither a handler nor an auto-bind target.
    #[error("observable field `{field}` on `{model}` has no handler and no UI binding")]
    UnboundField { field: String, model: &'static str },

    /// A handler or auto-bind names a field the model does not declare.
    #[error("`{member}` targets unknown observable field `{field}` on `{model}`")]
    UnknownField {
        member: String,
        field: String,
        model: &'static str,
    },

    /// A handler declares more parameters than the dispatcher can supply.
    #[error("handler `{method}` for `{field}` declares {arity} parameters; at most 2 are supported")]
    UnsupportedArity {
        method: String,
        field: String,
        arity: usize,
    },

    /// A typed handler expects a different value type than the field holds.
    #[error("handler `{method}` expects `{expected}` but field `{field}` holds `{found}`")]
    HandlerTypeMismatch {
        method: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The model was torn down; nothing was bound.
    #[error("model `{model}` ({id}) was torn down and cannot be bound")]
    TornDown { model: &'static str, id: ModelId },

    /// No registered adapter can drive the UI component type.
    #[error("no UI adapter handles `{ui_type}` (auto-bind `{member}` -> `{field}`)")]
    NoAdapter {
        member: String,
        field: String,
        ui_type: &'static str,
    },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Per-member failures while restoring a snapshot.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The snapshot value does not fit the live member's type.
    #[error("snapshot member `{member}` does not match `{expected}`: found {found}")]
    TypeMismatch {
        member: String,
        expected: &'static str,
        found: String,
        #[source]
        source: serde_json::Error,
    },

    /// Any other conversion failure for one member.
    #[error("snapshot member `{member}`: {source}")]
    Member {
        member: String,
        #[source]
        source: ValueError,
    },

    /// The snapshot source was not an object of named members.
    #[error("snapshot source must be an object, found {found}")]
    NotAnObject { found: String },

    /// The snapshot source could not be encoded at all.
    #[error("cannot build snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Short description of a dynamic value for diagnostics.
pub(crate) fn describe_value(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) if s.chars().count() > 32 => {
            let head: String = s.chars().take(32).collect();
            format!("string \"{head}…\"")
        }
        Value::String(s) => format!("string \"{s}\""),
        Value::Array(items) => format!("array of {} items", items.len()),
        Value::Object(map) => format!("object with {} members", map.len()),
    }
}
