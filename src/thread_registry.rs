//! Caller-supplied thread labels keyed by thread identity.
//!
//! The registry is an explicit mapping rather than thread-local state so
//! labels survive as long as the owning client and independent clients
//! cannot observe each other's labels.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::RwLock;

/// Registry of human-readable labels for calling threads.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    labels: RwLock<HashMap<ThreadId, String>>,
}

impl ThreadRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `name` with the calling thread, replacing any previous
    /// association.
    pub fn set_current(&self, name: &str) {
        self.labels
            .write()
            .insert(thread::current().id(), name.to_owned());
    }

    /// The label registered for the calling thread, if any.
    pub fn get_current(&self) -> Option<String> {
        self.labels.read().get(&thread::current().id()).cloned()
    }

    /// Resolve the wire label for the calling thread.
    ///
    /// Resolution order: explicit per-record override, registry entry,
    /// OS thread name, opaque thread id.
    pub fn resolve(&self, explicit: Option<&str>) -> String {
        if let Some(label) = explicit {
            return label.to_owned();
        }
        if let Some(label) = self.get_current() {
            return label;
        }
        let current = thread::current();
        match current.name() {
            Some(name) => name.to_owned(),
            None => format!("{:?}", current.id()),
        }
    }
}
