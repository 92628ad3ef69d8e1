//! Concurrent storage for the container
//!
//! Uses DashMap for lock-free concurrent access. Every accessor clones what
//! it returns so no map guard outlives the call; resolution re-enters the
//! container recursively and must never hold a shard lock while doing so.

use crate::binding::Binding;
use crate::class::{Callable, ClassDef};
use crate::value::Value;
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;
use std::hash::Hash;
use std::sync::Arc;

/// Thread-safe storage behind a [`Container`](crate::Container)
pub(crate) struct ServiceStorage {
    /// Binding registry
    bindings: DashMap<String, Binding, RandomState>,
    /// Instance cache for singleton bindings
    instances: DashMap<String, Value, RandomState>,
    /// Class catalog
    classes: DashMap<String, Arc<ClassDef>, RandomState>,
    /// Concrete type → class name, for calling methods on resolved objects
    class_names: DashMap<TypeId, String, RandomState>,
    /// Named functions for the invoker
    functions: DashMap<String, Arc<Callable>, RandomState>,
}

impl ServiceStorage {
    /// Create new empty storage.
    ///
    /// Uses 8 shards; containers rarely hold more than a few hundred
    /// bindings and shard creation dominates for small maps.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated capacity and scaled shards.
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            bindings: sharded(capacity, shard_amount),
            instances: sharded(capacity, shard_amount),
            classes: sharded(capacity, shard_amount),
            class_names: sharded(capacity, shard_amount),
            functions: sharded(0, 8),
        }
    }

    // =========================================================================
    // Bindings & instances
    // =========================================================================

    /// Install a binding, dropping any cached instance for the name.
    #[inline]
    pub fn bind(&self, name: String, binding: Binding) -> Option<Binding> {
        let previous = self.bindings.insert(name.clone(), binding);
        self.instances.remove(&name);
        previous
    }

    /// Remove a binding and its cached instance.
    #[inline]
    pub fn unbind(&self, name: &str) -> bool {
        let had_instance = self.instances.remove(name).is_some();
        self.bindings.remove(name).is_some() || had_instance
    }

    #[inline]
    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.get(name).map(|b| b.clone())
    }

    #[inline]
    pub fn instance(&self, name: &str) -> Option<Value> {
        self.instances.get(name).map(|v| v.clone())
    }

    /// Cache an instance unless one is already cached; returns the winner.
    #[inline]
    pub fn cache_instance(&self, name: &str, value: Value) -> Value {
        self.instances
            .entry(name.to_string())
            .or_insert(value)
            .clone()
    }

    /// Cache an instance, replacing any existing one.
    #[inline]
    pub fn put_instance(&self, name: String, value: Value) {
        self.instances.insert(name, value);
    }

    #[inline]
    pub fn forget_instance(&self, name: &str) -> bool {
        self.instances.remove(name).is_some()
    }

    /// Whether a binding or a cached instance exists
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name) || self.instances.contains_key(name)
    }

    /// Names with a binding or cached instance, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings
            .iter()
            .map(|r| r.key().clone())
            .chain(self.instances.iter().map(|r| r.key().clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Number of bindings
    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.instances.is_empty()
    }

    /// Clear bindings (with their default arguments) and cached instances.
    ///
    /// The class catalog and registered functions describe code, not state,
    /// and survive a reset.
    pub fn reset(&self) {
        self.bindings.clear();
        self.instances.clear();
    }

    // =========================================================================
    // Class catalog
    // =========================================================================

    /// Add or replace a class by name.
    ///
    /// The first class registered for a Rust type stays that type's class
    /// for object method lookup, even when later classes share the type.
    pub fn insert_class(&self, class: ClassDef) {
        if let Some(type_id) = class.type_id() {
            self.class_names
                .entry(type_id)
                .or_insert_with(|| class.name().to_string());
        }
        self.classes.insert(class.name().to_string(), Arc::new(class));
    }

    #[inline]
    pub fn class(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.classes.get(name).map(|c| Arc::clone(&c))
    }

    #[inline]
    pub fn class_of(&self, type_id: &TypeId) -> Option<Arc<ClassDef>> {
        let name = self.class_names.get(type_id).map(|n| n.clone())?;
        self.class(&name)
    }

    #[inline]
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    pub fn insert_function(&self, function: Callable) {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
    }

    #[inline]
    pub fn function(&self, name: &str) -> Option<Arc<Callable>> {
        self.functions.get(name).map(|f| Arc::clone(&f))
    }
}

/// Build an empty map with the given shard count
fn sharded<K: Eq + Hash, V>(capacity: usize, shard_amount: usize) -> DashMap<K, V, RandomState> {
    DashMap::with_capacity_and_hasher_and_shard_amount(capacity, RandomState::new(), shard_amount)
}

impl Default for ServiceStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStorage")
            .field("bindings", &self.bindings.len())
            .field("instances", &self.instances.len())
            .field("classes", &self.classes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Definition;
    use crate::value::Args;

    fn binding(class: &str, singleton: bool) -> Binding {
        Binding {
            definition: Definition::class(class),
            args: Args::none(),
            singleton,
        }
    }

    #[test]
    fn test_rebind_drops_cached_instance() {
        let storage = ServiceStorage::new();
        storage.bind("Logger".into(), binding("FileLogger", true));
        storage.cache_instance("Logger", Value::new(1u8));
        assert!(storage.instance("Logger").is_some());

        storage.bind("Logger".into(), binding("NullLogger", true));
        assert!(storage.instance("Logger").is_none());
    }

    #[test]
    fn test_cache_instance_first_writer_wins() {
        let storage = ServiceStorage::new();
        let first = storage.cache_instance("Logger", Value::new(1u8));
        let second = storage.cache_instance("Logger", Value::new(2u8));

        assert!(Value::ptr_eq(&first, &second));
        assert_eq!(*second.downcast::<u8>().unwrap(), 1);
    }

    #[test]
    fn test_contains_and_reset() {
        let storage = ServiceStorage::new();
        assert!(!storage.contains("Logger"));

        storage.put_instance("Config".into(), Value::new(()));
        storage.bind("Logger".into(), binding("FileLogger", false));
        assert!(storage.contains("Logger"));
        assert!(storage.contains("Config"));
        assert_eq!(storage.names(), ["Config", "Logger"]);

        storage.reset();
        assert!(storage.is_empty());
        assert!(!storage.contains("Config"));
    }

    #[test]
    fn test_class_lookup_by_type() {
        #[derive(Default)]
        struct FileLogger;

        let storage = ServiceStorage::new();
        storage.insert_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));

        assert!(storage.has_class("FileLogger"));
        let class = storage.class_of(&TypeId::of::<FileLogger>()).unwrap();
        assert_eq!(class.name(), "FileLogger");
    }

    #[test]
    fn test_first_class_keeps_type_lookup() {
        #[derive(Default)]
        struct FileLogger;

        let storage = ServiceStorage::new();
        storage.insert_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));
        storage.insert_class(ClassDef::without_constructor::<FileLogger>("AuditLogger"));

        assert!(storage.has_class("AuditLogger"));
        let class = storage.class_of(&TypeId::of::<FileLogger>()).unwrap();
        assert_eq!(class.name(), "FileLogger");
    }
}
