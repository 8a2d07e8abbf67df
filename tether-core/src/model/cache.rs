//! Process-wide per-type memo.
//!
//! Model schemas and subscriber binding tables are pure functions of a Rust
//! type, so each is built once and shared. Building happens outside the map
//! lock; if two threads race, the first insert wins and both get it.

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

type Entry = Arc<dyn Any + Send + Sync>;

fn cache() -> &'static DashMap<TypeId, Entry> {
    static CACHE: OnceLock<DashMap<TypeId, Entry>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Get the cached value of type `T`, building it with `build` on first use.
pub(crate) fn get_or_build<T, F>(build: F) -> Arc<T>
where
    T: Any + Send + Sync,
    F: FnOnce() -> T,
{
    let key = TypeId::of::<T>();

    if let Some(hit) = cache().get(&key) {
        if let Ok(value) = Arc::clone(hit.value()).downcast::<T>() {
            return value;
        }
    }

    let fresh = Arc::new(build());
    let stored = cache()
        .entry(key)
        .or_insert_with(|| Arc::clone(&fresh) as Entry)
        .value()
        .clone();
    stored.downcast::<T>().unwrap_or(fresh)
}
