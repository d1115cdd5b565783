//! Process-wide published state.
//!
//! A keyed slot map where each key can be written at most once. The
//! orchestrator publishes its realtime handle under [`REALTIME_KEY`]; any code
//! in the process can read it back with [`ProcessRegistry::get`].

use std::any::Any;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Key under which the realtime handle is published.
pub const REALTIME_KEY: &str = "io";

static GLOBAL: Lazy<Arc<ProcessRegistry>> = Lazy::new(|| Arc::new(ProcessRegistry::new()));

/// First-writer-wins registry of shared values.
#[derive(Default)]
pub struct ProcessRegistry {
    slots: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("ProcessRegistry").field("keys", &keys).finish()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<ProcessRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Publish `value` under `key` unless something is already there.
    ///
    /// Returns `true` when this call performed the publish.
    pub fn publish_once<T>(&self, key: &str, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(value));
                true
            }
        }
    }

    /// Read a published value. `None` when unset or of another type.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.slots.get(key).map(|e| Arc::clone(e.value()))?;
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_writer_wins() {
        let registry = ProcessRegistry::new();
        assert!(registry.publish_once("io", 1u32));
        assert!(!registry.publish_once("io", 2u32));
        assert_eq!(registry.get::<u32>("io").as_deref(), Some(&1));
    }

    #[test]
    fn test_wrong_type_reads_none() {
        let registry = ProcessRegistry::new();
        registry.publish_once("io", "handle".to_string());
        assert!(registry.get::<u32>("io").is_none());
        assert!(registry.contains("io"));
    }

    #[test]
    fn test_concurrent_publish_has_one_winner() {
        let registry = Arc::new(ProcessRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.publish_once("slot", i))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&ProcessRegistry::global(), &ProcessRegistry::global()));
    }
}
