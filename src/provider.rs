//! Service provider traits
//!
//! A service provider groups the bindings of one subsystem. Providers are
//! registered in two phases: `register()` installs bindings, `boot()` runs
//! once the application has booted and every eager provider is registered.
//!
//! Deferred providers are not constructed until the first `make()` of the
//! name they supply, derived from the provider's type name.

use crate::{Container, Result};
use std::any::TypeId;
use std::sync::Arc;

/// Suffix stripped from a provider type name to get the service it supplies
pub const PROVIDER_SUFFIX: &str = "ServiceProvider";

/// A constructed service provider.
pub trait ServiceProvider: Send + Sync + 'static {
    /// Install bindings.
    fn register(&self, container: &Container) -> Result<()>;

    /// Finish wiring after the application has booted.
    fn boot(&self, _container: &Container) -> Result<()> {
        Ok(())
    }
}

/// A provider type the container can construct itself.
///
/// # Examples
///
/// ```rust
/// use service_container::{
///     ClassDef, Container, Definition, ProviderClass, ProviderType, Result, ServiceProvider,
/// };
///
/// #[derive(Default)]
/// struct SmtpMailer;
///
/// struct MailerServiceProvider;
///
/// impl ServiceProvider for MailerServiceProvider {
///     fn register(&self, container: &Container) -> Result<()> {
///         container.register_class(ClassDef::without_constructor::<SmtpMailer>("SmtpMailer"));
///         container.singleton("Mailer", Definition::class("SmtpMailer"));
///         Ok(())
///     }
/// }
///
/// impl ProviderType for MailerServiceProvider {
///     const DEFER: Option<bool> = Some(true);
///
///     fn construct(_: &Container) -> Result<Self> {
///         Ok(MailerServiceProvider)
///     }
/// }
///
/// let container = Container::new();
/// container.configure([ProviderClass::of::<MailerServiceProvider>()]).unwrap();
/// assert!(!container.is_bound("Mailer"));
///
/// let mailer = container.get::<SmtpMailer>("Mailer").unwrap();
/// assert!(container.is_bound("Mailer"));
/// # let _ = mailer;
/// ```
pub trait ProviderType: ServiceProvider + Sized {
    /// `Some(false)` registers eagerly; `None` or `Some(true)` defers.
    const DEFER: Option<bool> = None;

    fn construct(container: &Container) -> Result<Self>;
}

/// Type-erased provider constructor
type ConstructFn = Arc<dyn Fn(&Container) -> Result<Arc<dyn ServiceProvider>> + Send + Sync>;

/// A provider class reference: everything known about a provider type
/// without constructing it.
#[derive(Clone)]
pub struct ProviderClass {
    type_id: TypeId,
    type_name: &'static str,
    short_name: String,
    defer: Option<bool>,
    construct: ConstructFn,
}

impl ProviderClass {
    /// Describe provider type `P`.
    pub fn of<P: ProviderType>() -> Self {
        let type_name = std::any::type_name::<P>();
        Self {
            type_id: TypeId::of::<P>(),
            type_name,
            short_name: short_name(type_name),
            defer: P::DEFER,
            construct: Arc::new(|container: &Container| {
                P::construct(container).map(|p| Arc::new(p) as Arc<dyn ServiceProvider>)
            }),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Name of the service a deferred provider must register.
    #[inline]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// The declared `DEFER` value.
    #[inline]
    pub fn defer(&self) -> Option<bool> {
        self.defer
    }

    /// Whether `configure` leaves this provider for first use.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.defer != Some(false)
    }

    pub(crate) fn construct(&self, container: &Container) -> Result<Arc<dyn ServiceProvider>> {
        (self.construct)(container)
    }
}

impl std::fmt::Debug for ProviderClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClass")
            .field("type_name", &self.type_name)
            .field("short_name", &self.short_name)
            .field("defer", &self.defer)
            .finish()
    }
}

/// Bare type name with module path, generic arguments and the
/// `ServiceProvider` suffix removed.
fn short_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let bare = base.rsplit("::").next().unwrap_or(base);
    bare.strip_suffix(PROVIDER_SUFFIX).unwrap_or(bare).to_string()
}

/// A provider handed to [`Container::register_provider`]: either an instance
/// or a class the container constructs.
#[derive(Clone)]
pub enum ProviderRef {
    Instance {
        type_id: TypeId,
        type_name: &'static str,
        provider: Arc<dyn ServiceProvider>,
    },
    Class(ProviderClass),
}

impl ProviderRef {
    /// Wrap a constructed provider.
    pub fn instance<P: ServiceProvider>(provider: P) -> Self {
        ProviderRef::Instance {
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            provider: Arc::new(provider),
        }
    }

    /// Refer to a provider type.
    pub fn class<P: ProviderType>() -> Self {
        ProviderRef::Class(ProviderClass::of::<P>())
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        match self {
            ProviderRef::Instance { type_id, .. } => *type_id,
            ProviderRef::Class(class) => class.type_id(),
        }
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            ProviderRef::Instance { type_name, .. } => type_name,
            ProviderRef::Class(class) => class.type_name(),
        }
    }
}

impl From<ProviderClass> for ProviderRef {
    fn from(class: ProviderClass) -> Self {
        ProviderRef::Class(class)
    }
}

impl std::fmt::Debug for ProviderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderRef::Instance { type_name, .. } => {
                f.debug_tuple("Instance").field(type_name).finish()
            }
            ProviderRef::Class(class) => f.debug_tuple("Class").field(class).finish(),
        }
    }
}

/// Where a provider type is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderState {
    /// Never seen by the container
    #[default]
    Unregistered,
    /// Waiting for the first `make()` of its short name
    Deferred,
    /// Constructed and `register()`ed
    Registered,
    /// `boot()`ed
    Booted,
}

/// Build a list of [`ProviderClass`] values from provider types.
///
/// ```rust,ignore
/// container.configure(providers![CacheServiceProvider, MailerServiceProvider])?;
/// ```
#[macro_export]
macro_rules! providers {
    ($($provider:ty),* $(,)?) => {
        vec![$($crate::ProviderClass::of::<$provider>()),*]
    };
}
