//! Read instrumentation.
//!
//! Callbacks are attached to sources by name. The name is what travels with
//! a serialized source; the receiving process re-attaches whatever callback
//! it registered under that name, or none.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Observer invoked once per range fetch, before the fetch is issued.
///
/// Must not alter control flow: results and errors of the read are passed
/// through untouched.
pub trait ReadCallback: Send + Sync {
    fn on_read(&self, source: &str, start: u64, length: u64);
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn ReadCallback>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Process-wide table of named callbacks.
pub struct CallbackRegistry;

impl CallbackRegistry {
    /// Register `callback` under `name`, replacing any previous entry.
    pub fn register(name: impl Into<String>, callback: Arc<dyn ReadCallback>) -> CallbackHandle {
        let name = name.into();
        let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
        registry.insert(name.clone(), callback);
        CallbackHandle { name }
    }

    /// Remove the callback registered under `name`.
    pub fn unregister(name: &str) -> bool {
        let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
        registry.remove(name).is_some()
    }

    pub fn lookup(name: &str) -> Option<Arc<dyn ReadCallback>> {
        let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
        registry.get(name).cloned()
    }
}

/// Serializable reference to a registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallbackHandle {
    name: String,
}

impl CallbackHandle {
    /// Refer to a callback by name, whether or not it is registered yet.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The callback currently registered under this name.
    pub fn resolve(&self) -> Option<Arc<dyn ReadCallback>> {
        CallbackRegistry::lookup(&self.name)
    }
}

impl fmt::Display for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Counts range reads and requested bytes.
#[derive(Debug, Default)]
pub struct ReadCounter {
    reads: AtomicU64,
    bytes: AtomicU64,
}

impl ReadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of range reads observed.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Total bytes requested across all reads.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.bytes.store(0, Ordering::SeqCst);
    }
}

impl ReadCallback for ReadCounter {
    fn on_read(&self, source: &str, start: u64, length: u64) {
        tracing::trace!(source, start, length, "Counted range read");
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(length, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_counts() {
        let counter = ReadCounter::new();
        counter.on_read("a", 0, 10);
        counter.on_read("a", 10, 5);
        assert_eq!(counter.reads(), 2);
        assert_eq!(counter.bytes(), 15);
        counter.reset();
        assert_eq!(counter.reads(), 0);
    }

    #[test]
    fn test_registry_round_trip() {
        let counter = Arc::new(ReadCounter::new());
        let handle = CallbackRegistry::register("callback-unit-test", counter.clone());

        let resolved = handle.resolve().unwrap();
        resolved.on_read("x", 0, 4);
        assert_eq!(counter.reads(), 1);

        assert!(CallbackRegistry::unregister("callback-unit-test"));
        assert!(handle.resolve().is_none());
    }

    #[test]
    fn test_unregistered_name_resolves_to_none() {
        assert!(CallbackHandle::named("never-registered").resolve().is_none());
    }
}
