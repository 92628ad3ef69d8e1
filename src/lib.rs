//! # service-container - Autowiring IoC Container for Rust
//!
//! A runtime inversion-of-control container: bind logical names to classes,
//! factories or configuration maps, and let the container build the object
//! graph by autowiring constructor parameters.
//!
//! ## Features
//!
//! - **Named bindings** - class names, factories, or `{class, ...overrides}` maps
//! - **Autowiring** - constructor parameters filled from the container,
//!   positional or named arguments, then declared defaults
//! - **Singletons** - first instance cached, with explicit fresh builds
//! - **Invoker** - call functions and methods with injected parameters
//! - **Service providers** - two-phase register/boot, with deferred
//!   providers activated on first use
//! - **Lock-free** - `DashMap` storage, `Clone + Send + Sync` container
//! - **Observable** - optional `tracing` events under `service_container`
//!
//! ## Quick Start
//!
//! ```rust
//! use service_container::{Args, ClassDef, Container, Param};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct FileLogger;
//!
//! struct UserService {
//!     logger: Arc<FileLogger>,
//!     user_name: String,
//! }
//!
//! let container = Container::new();
//! container.register_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));
//! container.register_class(ClassDef::new::<UserService, _>(
//!     "UserService",
//!     [Param::service("logger", "Logger"), Param::new("userName")],
//!     |args| Ok(UserService { logger: args.get(0)?, user_name: args.cloned(1)? }),
//! ));
//!
//! // Shared logger behind a logical name
//! container.singleton("Logger", "FileLogger");
//!
//! // `user_name` satisfies the `userName` parameter
//! let users = container
//!     .get_with::<UserService>("UserService", Args::named([("user_name", "ada")]))
//!     .unwrap();
//! assert_eq!(users.user_name, "ada");
//! assert!(Arc::ptr_eq(&users.logger, &container.get::<FileLogger>("Logger").unwrap()));
//! ```
//!
//! ## Deferred Providers
//!
//! A provider whose `DEFER` is not `Some(false)` is only constructed when
//! its short name (type name minus `ServiceProvider`) is first resolved.
//! See [`ProviderType`].

mod autowire;
mod binding;
mod class;
mod container;
mod error;
mod facade;
mod invoke;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod service;
mod storage;
mod value;

pub use binding::*;
pub use class::*;
pub use container::*;
pub use error::*;
pub use facade::*;
pub use invoke::*;
pub use provider::*;
pub use value::*;

#[cfg(feature = "derive")]
pub use service_container_derive::Autowire;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Autowire, BindEntry, Callable, Callback, ClassDef, Container, Definition, DiError,
        Facade, MethodDef, MethodTarget, Param, Properties, ProviderClass, ProviderRef,
        ProviderState, ProviderType, ResolvedArgs, Result, ServiceProvider, Value,
    };
    pub use std::sync::Arc;
}
