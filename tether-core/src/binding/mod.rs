//! Binding
//!
//! Everything between models and the things that react to them: subscriber
//! declarations, the binding engine, UI adapters and the presenter/loader
//! roles.

mod adapter;
mod engine;
mod roles;
mod table;

pub use adapter::{AdapterRegistry, ListenerToken, UiAdapter, UiCallback, UiComponent, UiType};
pub use engine::{BindingReport, Bindings};
pub use roles::{Loader, Presenter};
pub use table::{BindingTable, HandlerMethod, Subscriber, UiBinding};
