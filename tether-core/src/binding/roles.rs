//! Presenter and loader roles.
//!
//! A presenter is any [`Subscriber`] that binds itself when it comes alive
//! and unbinds when it goes away. A [`Loader`] owns a model while the host's
//! save system restores it, before any presenter can see it.

use std::sync::Arc;

use super::engine::{BindingReport, Bindings};
use super::table::Subscriber;
use crate::model::{DataModel, LoadReport, RemovalStats, Snapshot};

/// Lifecycle helpers for shared subscribers.
pub trait Presenter: Subscriber {
    /// Wire this presenter to its model. Safe to call repeatedly.
    fn bind(self: &Arc<Self>, bindings: &Bindings) -> BindingReport {
        bindings.set_listeners(self)
    }

    /// Remove everything this presenter registered on its model.
    fn unbind(self: &Arc<Self>, bindings: &Bindings) -> RemovalStats {
        match self.model() {
            Some(model) => bindings.remove_all_subscriptions(&*model, self.subscriber_id()),
            None => RemovalStats::default(),
        }
    }
}

impl<S: Subscriber> Presenter for S {}

/// Exclusive owner of a model during restore.
///
/// Applying a snapshot before the model is shared means no presenter is
/// registered yet, so the restore does not reach any UI.
#[derive(Debug, Default)]
pub struct Loader<M: DataModel> {
    model: M,
}

impl<M: DataModel> Loader<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The save side: the model's current state.
    pub fn snapshot(&self) -> Snapshot {
        self.model.snapshot()
    }

    /// The load side: link fields, then copy the snapshot in.
    pub fn apply(&mut self, snapshot: &Snapshot) -> LoadReport {
        self.model.ensure_fields_initialized();
        self.model.load_data_from_model(snapshot)
    }

    /// Hand the restored model out for presenters to bind to.
    pub fn into_shared(self) -> Arc<M> {
        Arc::new(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingTable;
    use crate::model::{ModelCore, SchemaBuilder};
    use crate::reactive::{ObservableVariable, SubscriberId};
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Wallet {
        core: ModelCore,
        coins: ObservableVariable<u64>,
    }

    impl DataModel for Wallet {
        fn core(&self) -> &ModelCore {
            &self.core
        }

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.observable("coins", |m: &Self| &m.coins);
        }
    }

    struct CoinCounter {
        id: SubscriberId,
        wallet: Arc<Wallet>,
    }

    impl Subscriber for CoinCounter {
        type Model = Wallet;

        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn model(&self) -> Option<Arc<Wallet>> {
            Some(Arc::clone(&self.wallet))
        }

        fn declare(table: &mut BindingTable<Self>) {
            table.on_change("coins", "refresh", |_: &Self| {});
        }
    }

    #[test]
    fn loader_restores_before_sharing() {
        let mut loader = Loader::new(Wallet::default());
        let report = loader.apply(&Snapshot::from_value(json!({ "coins": 250 })).unwrap());
        assert!(report.is_clean());

        let wallet = loader.into_shared();
        assert_eq!(wallet.coins.value(), 250);
        assert_eq!(wallet.coins.parent_model(), Some(wallet.model_id()));
    }

    #[test]
    fn presenter_bind_and_unbind() {
        let bindings = Bindings::default();
        let counter = Arc::new(CoinCounter {
            id: SubscriberId::new(),
            wallet: Arc::new(Wallet::default()),
        });

        assert_eq!(counter.bind(&bindings).handlers_bound, 1);
        assert_eq!(counter.bind(&bindings).handlers_bound, 1);
        assert_eq!(counter.wallet.coins.handler_count(), 1);

        assert_eq!(counter.unbind(&bindings).delegates, 1);
        assert_eq!(counter.wallet.coins.handler_count(), 0);
        assert!(counter.unbind(&bindings).is_empty());
    }
}
