//! Service container
//!
//! The `Container` owns the binding registry, the singleton instance cache
//! and the class catalog, and resolves logical names into objects.

use crate::autowire::resolve_parameters;
use crate::binding::{BindEntry, Binding, Definition, CLASS_KEY};
use crate::class::{Autowire, ClassDef};
use crate::service::ProviderRegistry;
use crate::storage::ServiceStorage;
use crate::value::{Args, Injectable, Properties, ResolvedArgs, Value};
use crate::{DiError, Result};
use std::cell::RefCell;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Thread-Local Resolution Stack
// =============================================================================

thread_local! {
    /// Names currently being resolved on this thread, tagged with the
    /// storage they belong to so unrelated containers never collide.
    static RESOLVING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a name as in flight for the lifetime of the guard.
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(storage_ptr: usize, name: &str) -> Result<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack
                .iter()
                .position(|(ptr, entry)| *ptr == storage_ptr && entry == name)
            {
                let mut path: Vec<String> = stack[start..]
                    .iter()
                    .filter(|(ptr, _)| *ptr == storage_ptr)
                    .map(|(_, entry)| entry.clone())
                    .collect();
                path.push(name.to_string());
                return Err(DiError::CircularDependency { path });
            }
            stack.push((storage_ptr, name.to_string()));
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Inversion-of-control container.
///
/// Cloning is cheap and every clone shares the same registry, cache, class
/// catalog and provider state.
///
/// # Examples
///
/// ```rust
/// use service_container::{ClassDef, Container, Definition};
///
/// #[derive(Default)]
/// struct FileLogger;
///
/// let container = Container::new();
/// container.register_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));
/// container.singleton("Logger", Definition::class("FileLogger"));
///
/// let first = container.make("Logger").unwrap();
/// let second = container.make("Logger").unwrap();
/// assert!(service_container::Value::ptr_eq(&first, &second));
///
/// let fresh = container.make_fresh("Logger").unwrap();
/// assert!(!service_container::Value::ptr_eq(&first, &fresh));
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) storage: Arc<ServiceStorage>,
    pub(crate) providers: Arc<ProviderRegistry>,
}

impl Container {
    /// Create an empty container.
    #[inline]
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(target: "service_container", "Creating new service container");

        Self {
            storage: Arc::new(ServiceStorage::new()),
            providers: Arc::new(ProviderRegistry::new()),
        }
    }

    /// Create a container with pre-allocated capacity.
    ///
    /// Use this when you know approximately how many bindings will be
    /// installed.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Arc::new(ServiceStorage::with_capacity(capacity)),
            providers: Arc::new(ProviderRegistry::new()),
        }
    }

    #[inline]
    fn storage_ptr(&self) -> usize {
        Arc::as_ptr(&self.storage) as usize
    }

    // =========================================================================
    // Class Catalog
    // =========================================================================

    /// Add a class to the catalog, replacing any class with the same name.
    ///
    /// Methods on a bare object are looked up through the first class
    /// registered for its Rust type.
    pub fn register_class(&self, class: ClassDef) {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            class = class.name(),
            rust_type = class.type_name(),
            instantiable = class.is_instantiable(),
            configurable = class.is_configurable(),
            "Registering class"
        );

        self.storage.insert_class(class);
    }

    /// Add the class a type describes through [`Autowire`].
    #[inline]
    pub fn register_class_of<T: Autowire>(&self) {
        self.register_class(T::class_def());
    }

    /// Whether a class is in the catalog.
    #[inline]
    pub fn has_class(&self, name: &str) -> bool {
        self.storage.has_class(name)
    }

    // =========================================================================
    // Binding Methods
    // =========================================================================

    /// Bind a name to a definition (not shared).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_container::{Container, Definition, Value};
    ///
    /// let container = Container::new();
    /// container.bind("answer", Definition::factory(|_, _, _| Ok(Value::new(42u32))));
    ///
    /// assert_eq!(*container.get::<u32>("answer").unwrap(), 42);
    /// ```
    #[inline]
    pub fn bind(&self, name: impl Into<String>, definition: impl Into<Definition>) {
        self.bind_with(name, definition, Args::none(), false);
    }

    /// Bind a name to a definition whose first resolved instance is shared.
    #[inline]
    pub fn singleton(&self, name: impl Into<String>, definition: impl Into<Definition>) {
        self.bind_with(name, definition, Args::none(), true);
    }

    /// Install or replace a binding with default arguments.
    ///
    /// Any instance cached under `name` is dropped.
    pub fn bind_with(
        &self,
        name: impl Into<String>,
        definition: impl Into<Definition>,
        args: Args,
        singleton: bool,
    ) {
        let name = name.into();
        let definition = definition.into();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            service = %name,
            definition = ?definition,
            default_args = args.len(),
            singleton = singleton,
            replaced = self.storage.contains(&name),
            "Binding service"
        );

        self.storage.bind(
            name,
            Binding {
                definition,
                args,
                singleton,
            },
        );
    }

    /// Install several bindings at once.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_container::{BindEntry, ClassDef, Container, Definition};
    ///
    /// #[derive(Default)]
    /// struct FileLogger;
    ///
    /// let container = Container::new();
    /// container.register_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));
    /// container.bind_many([
    ///     ("Logger", BindEntry::from((Definition::class("FileLogger"), true))),
    ///     ("Log", BindEntry::from("FileLogger")),
    /// ]);
    ///
    /// assert!(container.is_bound("Logger"));
    /// assert!(container.is_bound("Log"));
    /// ```
    pub fn bind_many<I, N, E>(&self, entries: I)
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: Into<BindEntry>,
    {
        #[cfg(feature = "logging")]
        let start_count = self.storage.len();

        for (name, entry) in entries {
            let entry = entry.into();
            self.bind_with(name, entry.definition, entry.args, entry.singleton);
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            bindings = self.storage.len(),
            added = self.storage.len().saturating_sub(start_count),
            "Batch binding completed"
        );
    }

    /// Store a pre-built shared instance under `name`.
    pub fn instance(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            service = %name,
            rust_type = value.type_name(),
            "Storing shared instance"
        );

        self.storage.put_instance(name, value);
    }

    /// Remove a binding and its cached instance.
    pub fn unbind(&self, name: &str) -> bool {
        let removed = self.storage.unbind(name);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            service = name,
            removed = removed,
            "Unbinding service"
        );

        removed
    }

    /// Drop the cached instance for `name`, keeping its binding.
    #[inline]
    pub fn forget_instance(&self, name: &str) -> bool {
        self.storage.forget_instance(name)
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve a name.
    #[inline]
    pub fn make(&self, name: &str) -> Result<Value> {
        self.make_with(name, Args::none(), Properties::new(), false)
    }

    /// Resolve a name, always building a new object.
    ///
    /// A cached singleton is neither returned nor replaced.
    #[inline]
    pub fn make_fresh(&self, name: &str) -> Result<Value> {
        self.make_with(name, Args::none(), Properties::new(), true)
    }

    /// Resolve a name with per-call arguments and property overrides.
    ///
    /// Resolution order:
    ///
    /// 1. a deferred provider supplying `name` is registered first
    /// 2. unless `fresh`, a cached instance is returned as is
    /// 3. without a binding, `name` is built as a class
    /// 4. otherwise the binding's factory runs, or its configuration map is
    ///    built with the per-call overrides layered on top
    /// 5. singleton results are cached unless `fresh`
    pub fn make_with(
        &self,
        name: &str,
        args: Args,
        overrides: Properties,
        fresh: bool,
    ) -> Result<Value> {
        if self.providers.is_deferred(name) {
            // A provider resolving its own name while registering is a cycle.
            let _guard = ResolutionGuard::enter(self.storage_ptr(), name)?;
            self.load_deferred(name)?;
        }

        if !fresh {
            if let Some(instance) = self.storage.instance(name) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_container",
                    service = name,
                    location = "instance_cache",
                    "Service resolved from cache"
                );
                return Ok(instance);
            }
        }

        let _guard = ResolutionGuard::enter(self.storage_ptr(), name)?;

        let Some(binding) = self.storage.binding(name) else {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_container",
                service = name,
                "No binding, building as class"
            );
            return self.build(name, args, overrides);
        };

        let args = binding.args.merged(args);
        let value = match &binding.definition {
            Definition::Factory(factory) => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_container",
                    service = name,
                    "Invoking factory"
                );
                factory(self, &args, &overrides)?
            }
            Definition::Config(map) => {
                let mut config = map.clone();
                let class = config
                    .remove(CLASS_KEY)
                    .ok_or_else(|| DiError::bad_configuration(name, "missing `class` entry"))?;
                let class = class
                    .downcast_ref::<String>()
                    .cloned()
                    .ok_or_else(|| DiError::bad_configuration(name, "`class` must be a string"))?;
                config.extend(overrides);
                self.build(&class, args, config)?
            }
        };

        if binding.singleton && !fresh {
            #[cfg(feature = "logging")]
            debug!(
                target: "service_container",
                service = name,
                rust_type = value.type_name(),
                "Caching singleton instance"
            );
            return Ok(self.storage.cache_instance(name, value));
        }

        Ok(value)
    }

    /// Resolve a name and downcast it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_container::{Container, DiError};
    ///
    /// let container = Container::new();
    /// container.instance("greeting", "hello");
    ///
    /// assert_eq!(*container.get::<String>("greeting").unwrap(), "hello");
    /// assert!(matches!(
    ///     container.get::<u32>("greeting"),
    ///     Err(DiError::TypeMismatch { .. })
    /// ));
    /// ```
    #[inline]
    pub fn get<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.get_with(name, Args::none())
    }

    /// Resolve a name with per-call arguments and downcast it.
    pub fn get_with<T: Injectable>(&self, name: &str, args: Args) -> Result<Arc<T>> {
        self.make_with(name, args, Properties::new(), false)?
            .downcast::<T>()
            .ok_or_else(|| DiError::type_mismatch::<T>(name))
    }

    /// Build a class from the catalog, bypassing bindings and the cache.
    ///
    /// Constructor parameters are autowired from `args`. Non-empty
    /// `overrides` go to the last constructor argument of a configurable
    /// class, otherwise they are assigned to declared properties after
    /// construction.
    pub fn build(&self, class: &str, args: Args, overrides: Properties) -> Result<Value> {
        let def = self.storage.class(class).ok_or_else(|| {
            #[cfg(feature = "logging")]
            debug!(
                target: "service_container",
                class = class,
                "Class not found in catalog"
            );
            DiError::not_found(class)
        })?;

        if !def.is_instantiable() {
            #[cfg(feature = "logging")]
            debug!(
                target: "service_container",
                class = class,
                "Class is abstract"
            );
            return Err(DiError::not_instantiable(class));
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "service_container",
            class = class,
            supplied_args = args.len(),
            overrides = overrides.len(),
            "Building class"
        );

        let config_overrides = !overrides.is_empty() && def.is_configurable();

        let resolved = match def.constructor_params() {
            Some(params) => {
                let mut resolved = resolve_parameters(self, class, params, args)?;
                if config_overrides && !resolved.replace_last(Value::from(overrides.clone())) {
                    return Err(DiError::bad_configuration(
                        class,
                        "configurable class has no constructor parameters",
                    ));
                }
                resolved
            }
            None if config_overrides => {
                return Err(DiError::bad_configuration(
                    class,
                    "configurable class has no constructor",
                ));
            }
            None => ResolvedArgs::new(class, Vec::new()),
        };

        let mut object = def.instantiate(resolved)?;

        if !config_overrides {
            for (property, value) in overrides {
                def.set_property(&mut *object, &property, value)?;
            }
        }

        Ok(Value::from_boxed(object, def.type_name()))
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Whether `name` resolves without building a class from scratch: a
    /// binding, a cached instance, or a deferred provider supplying it.
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.storage.contains(name) || self.providers.is_deferred(name)
    }

    /// Whether a binding or a cached instance exists for `name`.
    #[inline]
    pub fn is_bound(&self, name: &str) -> bool {
        self.storage.contains(name)
    }

    /// Names with a binding or cached instance, sorted.
    #[inline]
    pub fn bound_names(&self) -> Vec<String> {
        self.storage.names()
    }

    /// Number of bindings.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether there are no bindings and no cached instances.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Clear every binding, default argument set and cached instance.
    ///
    /// The class catalog, registered functions and provider state are kept.
    pub fn reset(&self) {
        let count = self.storage.len();
        self.storage.reset();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            bindings_removed = count,
            "Container reset"
        );
        #[cfg(not(feature = "logging"))]
        let _ = count;
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("storage", &self.storage)
            .field("providers", &self.providers)
            .finish()
    }
}
