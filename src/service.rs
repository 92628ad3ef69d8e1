//! Service bootstrap
//!
//! Drives the provider lifecycle: `configure` sorts provider classes into
//! eager and deferred, `register_provider` registers each provider type at
//! most once, and `boot` boots every registered provider exactly once.
//!
//! A provider's `register` runs inside a per-provider `OnceCell`: callers
//! racing on the same provider block until it finishes, and a failed
//! `register` leaves the cell empty so the next caller retries.

use crate::provider::{ProviderClass, ProviderRef, ProviderState, ServiceProvider};
use crate::{Container, DiError, Result};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// A provider known to the container
struct ProviderEntry {
    type_id: TypeId,
    type_name: &'static str,
    provider: Arc<dyn ServiceProvider>,
    registered: OnceCell<()>,
    booted: OnceCell<()>,
}

impl ProviderEntry {
    #[inline]
    fn is_registered(&self) -> bool {
        self.registered.get().is_some()
    }
}

/// Provider state shared by every clone of a container
pub(crate) struct ProviderRegistry {
    /// Short name → provider class waiting for first use
    deferred: DashMap<String, ProviderClass, RandomState>,
    /// Providers in registration order, including ones whose `register`
    /// has not completed yet
    entries: Mutex<Vec<Arc<ProviderEntry>>>,
    /// Only written while `entries` is locked
    booted: AtomicBool,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            deferred: DashMap::with_hasher_and_shard_amount(RandomState::new(), 8),
            entries: Mutex::new(Vec::new()),
            booted: AtomicBool::new(false),
        }
    }

    /// A panicking provider must not wedge the container.
    fn entries(&self) -> MutexGuard<'_, Vec<Arc<ProviderEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find(&self, type_id: TypeId) -> Option<Arc<ProviderEntry>> {
        self.entries()
            .iter()
            .find(|entry| entry.type_id == type_id)
            .cloned()
    }

    /// Providers whose `register` has completed.
    fn registered(&self) -> Vec<Arc<ProviderEntry>> {
        self.entries()
            .iter()
            .filter(|entry| entry.is_registered())
            .cloned()
            .collect()
    }

    #[inline]
    pub fn is_deferred(&self, name: &str) -> bool {
        !self.deferred.is_empty() && self.deferred.contains_key(name)
    }

    #[inline]
    fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Acquire)
    }

    /// Read the boot flag under the entries lock.
    ///
    /// `boot` sets the flag and snapshots under the same lock, so a provider
    /// that finishes `register` is either in that snapshot or sees the flag.
    fn booted_since_register(&self) -> bool {
        let _entries = self.entries();
        self.is_booted()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("registered", &self.registered().len())
            .field("deferred", &self.deferred.len())
            .field("booted", &self.is_booted())
            .finish()
    }
}

impl Container {
    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Sort provider classes into eager and deferred.
    ///
    /// `DEFER == Some(false)` constructs and registers the provider now
    /// (booting it too if the container has booted). Everything else waits
    /// for the first `make()` of the provider's short name. Two different
    /// deferred providers claiming one short name is `BadConfiguration`.
    pub fn configure<I>(&self, providers: I) -> Result<()>
    where
        I: IntoIterator<Item = ProviderClass>,
    {
        for class in providers {
            if !class.is_deferred() {
                self.register_provider(class)?;
                continue;
            }
            if self
                .providers
                .find(class.type_id())
                .is_some_and(|entry| entry.is_registered())
            {
                continue;
            }

            match self.providers.deferred.entry(class.short_name().to_string()) {
                Entry::Occupied(existing) if existing.get().type_id() == class.type_id() => {}
                Entry::Occupied(existing) => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "service_container",
                        service = class.short_name(),
                        provider = class.type_name(),
                        existing = existing.get().type_name(),
                        "Deferred service name already claimed"
                    );
                    return Err(DiError::bad_configuration(
                        class.short_name(),
                        format!(
                            "deferred by both {} and {}",
                            existing.get().type_name(),
                            class.type_name()
                        ),
                    ));
                }
                Entry::Vacant(slot) => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "service_container",
                        provider = class.type_name(),
                        service = class.short_name(),
                        "Deferring service provider"
                    );
                    slot.insert(class);
                }
            }
        }
        Ok(())
    }

    /// Register a provider instance or class.
    ///
    /// A provider type is registered at most once; registering it again
    /// returns the instance already registered, after waiting for a
    /// `register` still running on another thread. When the container has
    /// booted, the new provider is booted immediately.
    pub fn register_provider(
        &self,
        provider: impl Into<ProviderRef>,
    ) -> Result<Arc<dyn ServiceProvider>> {
        let provider = provider.into();
        let type_id = provider.type_id();

        let entry = match self.providers.find(type_id) {
            Some(existing) => existing,
            None => {
                let type_name = provider.type_name();
                let instance = match provider {
                    ProviderRef::Instance { provider, .. } => provider,
                    ProviderRef::Class(class) => class.construct(self)?,
                };

                let mut entries = self.providers.entries();
                // Another thread may have won while the provider was constructed.
                match entries.iter().find(|e| e.type_id == type_id) {
                    Some(existing) => Arc::clone(existing),
                    None => {
                        let entry = Arc::new(ProviderEntry {
                            type_id,
                            type_name,
                            provider: instance,
                            registered: OnceCell::new(),
                            booted: OnceCell::new(),
                        });
                        entries.push(Arc::clone(&entry));
                        entry
                    }
                }
            }
        };

        self.register_entry(&entry)?;

        if self.providers.booted_since_register() {
            self.boot_entry(&entry)?;
        }

        Ok(Arc::clone(&entry.provider))
    }

    fn register_entry(&self, entry: &ProviderEntry) -> Result<()> {
        if entry.is_registered() {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_container",
                provider = entry.type_name,
                "Provider already registered"
            );
            return Ok(());
        }

        entry
            .registered
            .get_or_try_init(|| {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_container",
                    provider = entry.type_name,
                    "Registering service provider"
                );
                entry.provider.register(self).inspect_err(|_err| {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "service_container",
                        provider = entry.type_name,
                        error = %_err,
                        "Service provider registration failed"
                    );
                })
            })
            .map(|_| ())
    }

    /// Mark the container booted and boot every registered provider once,
    /// in registration order.
    pub fn boot(&self) -> Result<()> {
        let entries = {
            let entries = self.providers.entries();
            self.providers.booted.store(true, Ordering::Release);
            entries.clone()
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            providers = entries.len(),
            deferred = self.providers.deferred.len(),
            "Booting container"
        );

        // Providers still inside `register` boot themselves when it completes.
        for entry in entries.iter().filter(|entry| entry.is_registered()) {
            self.boot_entry(entry)?;
        }
        Ok(())
    }

    fn boot_entry(&self, entry: &ProviderEntry) -> Result<()> {
        entry
            .booted
            .get_or_try_init(|| {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_container",
                    provider = entry.type_name,
                    "Booting service provider"
                );
                entry.provider.boot(self)
            })
            .map(|_| ())
    }

    /// Whether [`boot`](Self::boot) has been called.
    #[inline]
    pub fn is_booted(&self) -> bool {
        self.providers.is_booted()
    }

    /// Lifecycle state of provider type `P`.
    pub fn provider_state<P: ServiceProvider>(&self) -> ProviderState {
        let type_id = TypeId::of::<P>();
        if let Some(entry) = self.providers.find(type_id).filter(|e| e.is_registered()) {
            return if entry.booted.get().is_some() {
                ProviderState::Booted
            } else {
                ProviderState::Registered
            };
        }
        if self
            .providers
            .deferred
            .iter()
            .any(|class| class.type_id() == type_id)
        {
            return ProviderState::Deferred;
        }
        ProviderState::Unregistered
    }

    /// Registered providers in registration order.
    pub fn registered_providers(&self) -> Vec<Arc<dyn ServiceProvider>> {
        self.providers
            .registered()
            .iter()
            .map(|entry| Arc::clone(&entry.provider))
            .collect()
    }

    /// Names still waiting on a deferred provider, sorted.
    pub fn deferred_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .deferred
            .iter()
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Register the deferred provider supplying `name`, if any.
    ///
    /// The entry stays in the deferred map until the provider has
    /// registered and bound `name`, so concurrent callers wait on the same
    /// registration and a failed one is retried by the next `make`.
    pub(crate) fn load_deferred(&self, name: &str) -> Result<()> {
        if !self.providers.is_deferred(name) {
            return Ok(());
        }
        let Some(class) = self.providers.deferred.get(name).map(|c| c.value().clone()) else {
            return Ok(());
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            service = name,
            provider = class.type_name(),
            "Activating deferred service provider"
        );

        let type_id = class.type_id();
        let provider = class.type_name();
        self.register_provider(class)?;

        if !self.is_bound(name) {
            return Err(DiError::bad_configuration(
                name,
                format!("deferred provider {provider} did not bind it"),
            ));
        }

        self.providers
            .deferred
            .remove_if(name, |_, class| class.type_id() == type_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassDef;
    use crate::provider::ProviderType;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RedisCache;

    static CACHE_CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);
    static CACHE_REGISTERED: AtomicUsize = AtomicUsize::new(0);

    struct CacheServiceProvider;

    impl ServiceProvider for CacheServiceProvider {
        fn register(&self, container: &Container) -> Result<()> {
            CACHE_REGISTERED.fetch_add(1, Ordering::SeqCst);
            container.register_class(ClassDef::without_constructor::<RedisCache>("RedisCache"));
            container.singleton("Cache", "RedisCache");
            Ok(())
        }
    }

    impl ProviderType for CacheServiceProvider {
        const DEFER: Option<bool> = Some(true);

        fn construct(_: &Container) -> Result<Self> {
            CACHE_CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
            Ok(CacheServiceProvider)
        }
    }

    #[test]
    fn test_deferred_activation_exactly_once() {
        let container = Container::new();
        container
            .configure([ProviderClass::of::<CacheServiceProvider>()])
            .unwrap();

        assert_eq!(CACHE_CONSTRUCTED.load(Ordering::SeqCst), 0);
        assert!(container.has("Cache"));
        assert!(!container.is_bound("Cache"));
        assert_eq!(container.deferred_services(), ["Cache"]);
        assert_eq!(
            container.provider_state::<CacheServiceProvider>(),
            ProviderState::Deferred
        );

        let first = container.make("Cache").unwrap();
        let second = container.make("Cache").unwrap();

        assert!(first.is::<RedisCache>());
        assert!(crate::Value::ptr_eq(&first, &second));
        assert_eq!(CACHE_CONSTRUCTED.load(Ordering::SeqCst), 1);
        assert_eq!(CACHE_REGISTERED.load(Ordering::SeqCst), 1);
        assert!(container.deferred_services().is_empty());
        assert_eq!(
            container.provider_state::<CacheServiceProvider>(),
            ProviderState::Registered
        );
    }

    static EAGER_REGISTERED: AtomicUsize = AtomicUsize::new(0);
    static EAGER_BOOTED: AtomicUsize = AtomicUsize::new(0);

    struct RouteServiceProvider;

    impl ServiceProvider for RouteServiceProvider {
        fn register(&self, container: &Container) -> Result<()> {
            EAGER_REGISTERED.fetch_add(1, Ordering::SeqCst);
            container.instance("routes", "table");
            Ok(())
        }

        fn boot(&self, _: &Container) -> Result<()> {
            EAGER_BOOTED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl ProviderType for RouteServiceProvider {
        const DEFER: Option<bool> = Some(false);

        fn construct(_: &Container) -> Result<Self> {
            Ok(RouteServiceProvider)
        }
    }

    #[test]
    fn test_eager_registration_and_boot_once() {
        let container = Container::new();
        container
            .configure([ProviderClass::of::<RouteServiceProvider>()])
            .unwrap();

        assert_eq!(EAGER_REGISTERED.load(Ordering::SeqCst), 1);
        assert_eq!(EAGER_BOOTED.load(Ordering::SeqCst), 0);
        assert!(container.is_bound("routes"));

        // By class and by value: still one registration.
        container
            .register_provider(ProviderRef::class::<RouteServiceProvider>())
            .unwrap();
        container
            .register_provider(ProviderRef::instance(RouteServiceProvider))
            .unwrap();
        assert_eq!(EAGER_REGISTERED.load(Ordering::SeqCst), 1);
        assert_eq!(container.registered_providers().len(), 1);

        container.boot().unwrap();
        container.boot().unwrap();
        assert!(container.is_booted());
        assert_eq!(EAGER_BOOTED.load(Ordering::SeqCst), 1);
        assert_eq!(
            container.provider_state::<RouteServiceProvider>(),
            ProviderState::Booted
        );
    }

    static LATE_BOOTED: AtomicUsize = AtomicUsize::new(0);

    struct LateProvider;

    impl ServiceProvider for LateProvider {
        fn register(&self, _: &Container) -> Result<()> {
            Ok(())
        }

        fn boot(&self, _: &Container) -> Result<()> {
            LATE_BOOTED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_register_after_boot_boots_immediately() {
        let container = Container::new();
        container.boot().unwrap();

        let first = container.register_provider(ProviderRef::instance(LateProvider)).unwrap();
        let again = container.register_provider(ProviderRef::instance(LateProvider)).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(LATE_BOOTED.load(Ordering::SeqCst), 1);
    }

    struct MisnamedServiceProvider;

    impl ServiceProvider for MisnamedServiceProvider {
        fn register(&self, container: &Container) -> Result<()> {
            container.instance("SomethingElse", crate::Value::new(1u8));
            Ok(())
        }
    }

    impl ProviderType for MisnamedServiceProvider {
        fn construct(_: &Container) -> Result<Self> {
            Ok(MisnamedServiceProvider)
        }
    }

    #[test]
    fn test_deferred_provider_must_bind_short_name() {
        let container = Container::new();
        container
            .configure([ProviderClass::of::<MisnamedServiceProvider>()])
            .unwrap();

        let err = container.make("Misnamed").unwrap_err();
        assert!(matches!(err, DiError::BadConfiguration { .. }));
        assert!(container.is_bound("SomethingElse"));

        // Still reported on every later attempt, never as NotFound.
        let again = container.make("Misnamed").unwrap_err();
        assert_eq!(again, err);
    }

    struct FailingProvider;

    impl ServiceProvider for FailingProvider {
        fn register(&self, _: &Container) -> Result<()> {
            Err(DiError::creation_failed("FailingProvider", "no backend"))
        }
    }

    #[test]
    fn test_failed_registration_is_not_recorded() {
        let container = Container::new();
        let err = container
            .register_provider(ProviderRef::instance(FailingProvider))
            .err()
            .unwrap();

        assert!(matches!(err, DiError::CreationFailed { .. }));
        assert!(container.registered_providers().is_empty());
        assert_eq!(
            container.provider_state::<FailingProvider>(),
            ProviderState::Unregistered
        );
    }

    static SLOW_REGISTERED: AtomicUsize = AtomicUsize::new(0);

    struct SlowServiceProvider;

    impl ServiceProvider for SlowServiceProvider {
        fn register(&self, container: &Container) -> Result<()> {
            SLOW_REGISTERED.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(150));
            container.instance("Slow", crate::Value::new(7u32));
            Ok(())
        }
    }

    impl ProviderType for SlowServiceProvider {
        fn construct(_: &Container) -> Result<Self> {
            Ok(SlowServiceProvider)
        }
    }

    #[test]
    fn test_concurrent_deferred_activation_waits_for_register() {
        let container = Container::new();
        container
            .configure([ProviderClass::of::<SlowServiceProvider>()])
            .unwrap();

        let first = {
            let container = container.clone();
            std::thread::spawn(move || container.get::<u32>("Slow"))
        };
        std::thread::sleep(std::time::Duration::from_millis(30));
        let second = container.get::<u32>("Slow");

        assert_eq!(*second.unwrap(), 7);
        assert_eq!(*first.join().unwrap().unwrap(), 7);
        assert_eq!(SLOW_REGISTERED.load(Ordering::SeqCst), 1);
        assert!(container.deferred_services().is_empty());
    }

    static FLAKY_CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);
    static FLAKY_ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

    struct FlakyServiceProvider;

    impl ServiceProvider for FlakyServiceProvider {
        fn register(&self, container: &Container) -> Result<()> {
            if FLAKY_ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(DiError::creation_failed("Flaky", "backend not ready"));
            }
            container.instance("Flaky", "ready");
            Ok(())
        }
    }

    impl ProviderType for FlakyServiceProvider {
        fn construct(_: &Container) -> Result<Self> {
            FLAKY_CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
            Ok(FlakyServiceProvider)
        }
    }

    #[test]
    fn test_failed_deferred_activation_is_retried() {
        let container = Container::new();
        container
            .configure([ProviderClass::of::<FlakyServiceProvider>()])
            .unwrap();

        let err = container.make("Flaky").unwrap_err();
        assert!(matches!(err, DiError::CreationFailed { .. }));
        assert!(container.has("Flaky"));
        assert_eq!(container.deferred_services(), ["Flaky"]);
        assert_eq!(
            container.provider_state::<FlakyServiceProvider>(),
            ProviderState::Deferred
        );

        assert_eq!(*container.get::<String>("Flaky").unwrap(), "ready");
        assert_eq!(FLAKY_ATTEMPTS.load(Ordering::SeqCst), 2);
        assert_eq!(FLAKY_CONSTRUCTED.load(Ordering::SeqCst), 1);
        assert_eq!(
            container.provider_state::<FlakyServiceProvider>(),
            ProviderState::Registered
        );
        assert!(container.deferred_services().is_empty());
    }

    struct LoopServiceProvider;

    impl ServiceProvider for LoopServiceProvider {
        fn register(&self, container: &Container) -> Result<()> {
            container.make("Loop").map(|_| ())
        }
    }

    impl ProviderType for LoopServiceProvider {
        fn construct(_: &Container) -> Result<Self> {
            Ok(LoopServiceProvider)
        }
    }

    #[test]
    fn test_deferred_provider_resolving_itself_is_a_cycle() {
        let container = Container::new();
        container
            .configure([ProviderClass::of::<LoopServiceProvider>()])
            .unwrap();

        let err = container.make("Loop").unwrap_err();
        assert_eq!(
            err,
            DiError::CircularDependency {
                path: vec!["Loop".into(), "Loop".into()]
            }
        );
    }

    mod mail {
        use super::*;

        pub struct MailServiceProvider;

        impl ServiceProvider for MailServiceProvider {
            fn register(&self, container: &Container) -> Result<()> {
                container.instance("Mail", "smtp");
                Ok(())
            }
        }

        impl ProviderType for MailServiceProvider {
            fn construct(_: &Container) -> Result<Self> {
                Ok(MailServiceProvider)
            }
        }
    }

    mod legacy {
        use super::*;

        pub struct MailServiceProvider;

        impl ServiceProvider for MailServiceProvider {
            fn register(&self, container: &Container) -> Result<()> {
                container.instance("Mail", "sendmail");
                Ok(())
            }
        }

        impl ProviderType for MailServiceProvider {
            fn construct(_: &Container) -> Result<Self> {
                Ok(MailServiceProvider)
            }
        }
    }

    #[test]
    fn test_deferred_short_name_collision_rejected() {
        let container = Container::new();
        container
            .configure([
                ProviderClass::of::<mail::MailServiceProvider>(),
                ProviderClass::of::<mail::MailServiceProvider>(),
            ])
            .unwrap();

        let err = container
            .configure([ProviderClass::of::<legacy::MailServiceProvider>()])
            .unwrap_err();
        assert!(matches!(err, DiError::BadConfiguration { ref name, .. } if name == "Mail"));

        assert_eq!(*container.get::<String>("Mail").unwrap(), "smtp");
    }
}
