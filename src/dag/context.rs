// src/dag/context.rs

//! Scoped fixture storage shared by the nodes of a group.
//!
//! Every group owns one [`Context`] handle, built lazily the first time one of
//! its nodes runs. A child group starts from a shallow copy of its parent's
//! values ([`Context::derive_child`]), so fixtures seeded by a before-all hook
//! are visible to descendants while writes made inside a child never leak
//! back to siblings or ancestors. Test containers share their parent's handle.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Value = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct Context {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow copy: values are shared, the key space is not.
    pub fn derive_child(&self) -> Self {
        let copied = self.lock().clone();
        Self {
            values: Arc::new(Mutex::new(copied)),
        }
    }

    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.lock().insert(key.into(), Arc::new(value));
    }

    /// Typed lookup; `None` if the key is missing or holds another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.lock().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether both handles point at the same storage.
    pub fn same_scope(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .finish()
    }
}
