//! Invoker
//!
//! Calls closures, registered functions and object methods with their
//! parameters autowired the same way constructors are.

use crate::autowire::resolve_parameters;
use crate::class::Callable;
use crate::value::{Args, Value};
use crate::{Container, DiError, Result};

#[cfg(feature = "logging")]
use tracing::debug;

/// The receiver of a method call
#[derive(Clone, Debug)]
pub enum MethodTarget {
    /// An already resolved object; its class is found by runtime type.
    Object(Value),
    /// A name resolved through [`Container::make`] first.
    Class(String),
}

impl From<Value> for MethodTarget {
    fn from(value: Value) -> Self {
        MethodTarget::Object(value)
    }
}

impl From<&str> for MethodTarget {
    fn from(name: &str) -> Self {
        MethodTarget::Class(name.to_string())
    }
}

impl From<String> for MethodTarget {
    fn from(name: String) -> Self {
        MethodTarget::Class(name)
    }
}

/// Something [`Container::call`] can invoke
#[derive(Clone, Debug)]
pub enum Callback {
    /// A closure with declared parameters
    Closure(Callable),
    /// A function registered with [`Container::register_function`]
    Function(String),
    /// A method on an object or a resolved name
    Method(MethodTarget, String),
}

impl Callback {
    /// Interpret a dynamic value as a callback.
    ///
    /// Accepts a [`Callback`], a [`Callable`], a function name, or a
    /// `(target, method)` pair given as `(String, String)` or
    /// `(Value, String)`.
    pub fn from_value(value: &Value) -> Result<Self> {
        if let Some(callback) = value.downcast_ref::<Callback>() {
            return Ok(callback.clone());
        }
        if let Some(callable) = value.downcast_ref::<Callable>() {
            return Ok(Callback::Closure(callable.clone()));
        }
        if let Some(name) = value.downcast_ref::<String>() {
            return Ok(Callback::Function(name.clone()));
        }
        if let Some((class, method)) = value.downcast_ref::<(String, String)>() {
            return Ok(Callback::Method(
                MethodTarget::Class(class.clone()),
                method.clone(),
            ));
        }
        if let Some((object, method)) = value.downcast_ref::<(Value, String)>() {
            return Ok(Callback::Method(
                MethodTarget::Object(object.clone()),
                method.clone(),
            ));
        }
        Err(DiError::bad_callable(
            value.type_name(),
            "value is not callable",
        ))
    }
}

impl From<Callable> for Callback {
    fn from(callable: Callable) -> Self {
        Callback::Closure(callable)
    }
}

impl Container {
    // =========================================================================
    // Invoker
    // =========================================================================

    /// Register a named function for [`call_named`](Self::call_named).
    pub fn register_function(&self, function: Callable) {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            function = function.name(),
            params = function.params().len(),
            "Registering function"
        );

        self.storage.insert_function(function);
    }

    /// Call a closure with autowired parameters.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_container::{Args, Callable, Container, Param, Value};
    ///
    /// let container = Container::new();
    /// container.instance("greeting", "hello");
    ///
    /// let greet = Callable::new(
    ///     "greet",
    ///     [Param::service("greeting", "greeting"), Param::new("userName")],
    ///     |args| {
    ///         let greeting: String = args.cloned(0)?;
    ///         let name: String = args.cloned(1)?;
    ///         Ok(Value::new(format!("{greeting}, {name}")))
    ///     },
    /// );
    ///
    /// let out = container
    ///     .call_function(&greet, Args::named([("user_name", "ada")]))
    ///     .unwrap();
    /// assert_eq!(out.downcast_ref::<String>().unwrap(), "hello, ada");
    /// ```
    pub fn call_function(&self, function: &Callable, args: Args) -> Result<Value> {
        let resolved = resolve_parameters(self, function.name(), function.params(), args)?;
        function.invoke(resolved)
    }

    /// Call a function registered under `name`.
    pub fn call_named(&self, name: &str, args: Args) -> Result<Value> {
        let function = self
            .storage
            .function(name)
            .ok_or_else(|| DiError::bad_callable(name, "function not found"))?;
        self.call_function(&function, args)
    }

    /// Call `method` on a target object or on the object a name resolves to.
    pub fn call_method(
        &self,
        target: impl Into<MethodTarget>,
        method: &str,
        args: Args,
    ) -> Result<Value> {
        let receiver = match target.into() {
            MethodTarget::Object(object) => object,
            MethodTarget::Class(name) => self.make(&name)?,
        };

        let class = self
            .storage
            .class_of(&receiver.value_type_id())
            .ok_or_else(|| {
                DiError::bad_callable(
                    format!("{}::{method}", receiver.type_name()),
                    "object's class is not registered",
                )
            })?;
        let method_def = class.method_def(method).ok_or_else(|| {
            DiError::bad_callable(format!("{}::{method}", class.name()), "method not found")
        })?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            class = class.name(),
            method = method,
            "Invoking method"
        );

        let target = format!("{}::{method}", class.name());
        let resolved = resolve_parameters(self, &target, method_def.params(), args)?;
        method_def.invoke(&receiver, resolved)
    }

    /// Dispatch a callback.
    pub fn call(&self, callback: impl Into<Callback>, args: Args) -> Result<Value> {
        match callback.into() {
            Callback::Closure(callable) => self.call_function(&callable, args),
            Callback::Function(name) => self.call_named(&name, args),
            Callback::Method(target, method) => self.call_method(target, &method, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassDef, MethodDef, Param};

    struct Counter {
        base: u32,
    }

    fn counter_class() -> ClassDef {
        ClassDef::new::<Counter, _>(
            "Counter",
            [Param::new("base").with_default(Value::new(10u32))],
            |args| Ok(Counter { base: args.cloned(0)? }),
        )
        .method(MethodDef::new(
            "add",
            [Param::new("amount")],
            |c: &Counter, args| Ok(Value::new(c.base + args.cloned::<u32>(0)?)),
        ))
    }

    #[test]
    fn test_call_method_on_class_name() {
        let container = Container::new();
        container.register_class(counter_class());

        let out = container
            .call_method("Counter", "add", Args::positional([Value::new(5u32)]))
            .unwrap();
        assert_eq!(*out.downcast::<u32>().unwrap(), 15);
    }

    #[test]
    fn test_call_method_on_object() {
        let container = Container::new();
        container.register_class(counter_class());

        let object = Value::new(Counter { base: 1 });
        let out = container
            .call(
                Callback::Method(MethodTarget::Object(object), "add".into()),
                Args::named([("amount", Value::new(2u32))]),
            )
            .unwrap();
        assert_eq!(*out.downcast::<u32>().unwrap(), 3);
    }

    #[test]
    fn test_call_named_function() {
        let container = Container::new();
        container.register_function(Callable::new(
            "double",
            [Param::new("n")],
            |args| Ok(Value::new(args.cloned::<u32>(0)? * 2)),
        ));

        let out = container
            .call(
                Callback::Function("double".into()),
                Args::positional([Value::new(21u32)]),
            )
            .unwrap();
        assert_eq!(*out.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn test_invoker_errors() {
        let container = Container::new();
        container.register_class(counter_class());

        assert!(matches!(
            container.call_named("missing", Args::none()),
            Err(DiError::BadCallable { .. })
        ));
        assert!(matches!(
            container.call_method("Counter", "missing", Args::none()),
            Err(DiError::BadCallable { .. })
        ));
        assert!(matches!(
            container.call_method(Value::new(7u8), "add", Args::none()),
            Err(DiError::BadCallable { .. })
        ));
        assert!(matches!(
            Callback::from_value(&Value::new(7u8)),
            Err(DiError::BadCallable { .. })
        ));

        // Resolution failures propagate unchanged.
        assert_eq!(
            container.call_method("Nope", "add", Args::none()).unwrap_err(),
            DiError::not_found("Nope")
        );
        assert_eq!(
            container.call_method("Counter", "add", Args::none()).unwrap_err(),
            DiError::missing_parameter("amount", "Counter::add")
        );
    }

    #[test]
    fn test_callback_from_value() {
        let by_name = Callback::from_value(&Value::from("double")).unwrap();
        assert!(matches!(by_name, Callback::Function(name) if name == "double"));

        let pair = Value::new((String::from("Counter"), String::from("add")));
        assert!(matches!(
            Callback::from_value(&pair).unwrap(),
            Callback::Method(MethodTarget::Class(class), method) if class == "Counter" && method == "add"
        ));
    }
}
