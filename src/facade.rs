//! Static-style access to a bound service
//!
//! A facade names the binding it stands for; its provided functions forward
//! to the container.

use crate::value::{Args, Injectable, Value};
use crate::{Container, Result};
use std::sync::Arc;

/// A named shortcut to a bound service.
///
/// # Examples
///
/// ```rust
/// use service_container::{Args, ClassDef, Container, Facade, MethodDef, Param, Value};
///
/// #[derive(Default)]
/// struct Translator;
///
/// struct Lang;
///
/// impl Facade for Lang {
///     const ACCESSOR: &'static str = "translator";
/// }
///
/// let container = Container::new();
/// container.register_class(
///     ClassDef::without_constructor::<Translator>("Translator").method(MethodDef::new(
///         "get",
///         [Param::new("key")],
///         |_: &Translator, args| Ok(Value::new(format!("[{}]", args.cloned::<String>(0)?))),
///     )),
/// );
/// container.singleton("translator", "Translator");
///
/// let out = Lang::call(&container, "get", Args::positional(["welcome"])).unwrap();
/// assert_eq!(out.downcast_ref::<String>().unwrap(), "[welcome]");
/// ```
pub trait Facade {
    /// Name of the binding behind the facade
    const ACCESSOR: &'static str;

    /// Resolve the underlying service.
    fn resolve(container: &Container) -> Result<Value> {
        container.make(Self::ACCESSOR)
    }

    /// Resolve the underlying service as `T`.
    fn get<T: Injectable>(container: &Container) -> Result<Arc<T>> {
        container.get(Self::ACCESSOR)
    }

    /// Call a method on the underlying service.
    fn call(container: &Container, method: &str, args: Args) -> Result<Value> {
        container.call_method(Self::ACCESSOR, method, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassDef;
    use crate::DiError;

    #[derive(Default)]
    struct Clock;

    struct Time;

    impl Facade for Time {
        const ACCESSOR: &'static str = "clock";
    }

    #[test]
    fn test_facade_resolves_shared_instance() {
        let container = Container::new();
        container.register_class(ClassDef::without_constructor::<Clock>("Clock"));
        container.singleton("clock", "Clock");

        let a = Time::get::<Clock>(&container).unwrap();
        let b = Time::resolve(&container).unwrap().downcast::<Clock>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_facade_unbound() {
        let container = Container::new();
        assert_eq!(
            Time::resolve(&container).unwrap_err(),
            DiError::not_found("clock")
        );
    }
}
