//! Class descriptors
//!
//! Rust has no runtime constructor introspection, so every class the
//! container can build is described up front: its constructor parameters,
//! whether it can be instantiated at all, the public properties overrides may
//! assign, and the methods the invoker may call.
//!
//! Constructors, setters and methods are stored type-erased so the container
//! can drive them without knowing the concrete type.

use crate::value::{Injectable, ResolvedArgs, Value};
use crate::{DiError, Result};
use ahash::AHashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Type-erased constructor
type InstantiateFn =
    Arc<dyn Fn(ResolvedArgs) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Type-erased property setter
type SetPropertyFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Value) -> Result<()> + Send + Sync>;

/// Type-erased method body
type InvokeMethodFn = Arc<dyn Fn(&Value, ResolvedArgs) -> Result<Value> + Send + Sync>;

/// Type-erased free function body
type InvokeFn = Arc<dyn Fn(ResolvedArgs) -> Result<Value> + Send + Sync>;

// =============================================================================
// Param
// =============================================================================

/// A declared constructor, method or function parameter.
#[derive(Clone, Debug)]
pub struct Param {
    name: String,
    service: Option<String>,
    default: Option<Value>,
    variadic: bool,
}

impl Param {
    /// A plain parameter filled from supplied arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: None,
            default: None,
            variadic: false,
        }
    }

    /// A parameter whose declared type is a service resolved through the
    /// container.
    pub fn service(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            ..Self::new(name)
        }
    }

    /// A variadic parameter receiving every remaining argument as [`Args`](crate::Args).
    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            variadic: true,
            ..Self::new(name)
        }
    }

    /// Declare a default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn service_type(&self) -> Option<&str> {
        self.service.as_deref()
    }

    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

// =============================================================================
// MethodDef / Callable
// =============================================================================

/// A method that can be invoked with injected parameters.
#[derive(Clone)]
pub struct MethodDef {
    name: String,
    params: Vec<Param>,
    invoke: InvokeMethodFn,
}

impl MethodDef {
    /// Describe a method on `T`.
    ///
    /// The receiver is borrowed from the resolved object; the body gets the
    /// autowired arguments.
    pub fn new<T, F>(name: impl Into<String>, params: impl IntoIterator<Item = Param>, body: F) -> Self
    where
        T: Injectable,
        F: Fn(&T, ResolvedArgs) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = name.clone();
        Self {
            name,
            params: params.into_iter().collect(),
            invoke: Arc::new(move |receiver: &Value, args: ResolvedArgs| {
                let this = receiver.downcast_ref::<T>().ok_or_else(|| {
                    DiError::bad_callable(
                        format!("{}::{}", receiver.type_name(), method),
                        format!("receiver is not a {}", std::any::type_name::<T>()),
                    )
                })?;
                body(this, args)
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub(crate) fn invoke(&self, receiver: &Value, args: ResolvedArgs) -> Result<Value> {
        (self.invoke)(receiver, args)
    }
}

impl std::fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// A free function or closure with declared parameters.
#[derive(Clone)]
pub struct Callable {
    name: String,
    params: Vec<Param>,
    invoke: InvokeFn,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, params: impl IntoIterator<Item = Param>, body: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            invoke: Arc::new(body),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub(crate) fn invoke(&self, args: ResolvedArgs) -> Result<Value> {
        (self.invoke)(args)
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

// =============================================================================
// ClassDef
// =============================================================================

/// How a class may be constructed
#[derive(Clone)]
enum Construction {
    /// Abstract class or interface
    Abstract,
    /// No declared constructor, instantiated with no arguments
    Plain(InstantiateFn),
    /// Declared constructor with parameters to autowire
    Constructor {
        params: Vec<Param>,
        instantiate: InstantiateFn,
    },
}

/// Descriptor of a class the container can build.
///
/// # Examples
///
/// ```rust
/// use service_container::{ClassDef, Container, Param};
///
/// struct Mailer { host: String, port: u16 }
///
/// let container = Container::new();
/// container.register_class(ClassDef::new::<Mailer, _>(
///     "Mailer",
///     [Param::new("host"), Param::new("port").with_default(service_container::Value::new(25u16))],
///     |args| Ok(Mailer { host: args.cloned(0)?, port: args.cloned(1)? }),
/// ));
///
/// let mailer = container
///     .get_with::<Mailer>("Mailer", service_container::Args::positional(["smtp.local"]))
///     .unwrap();
/// assert_eq!(mailer.host, "smtp.local");
/// assert_eq!(mailer.port, 25);
/// ```
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    type_id: Option<TypeId>,
    type_name: &'static str,
    construction: Construction,
    configurable: bool,
    properties: AHashMap<String, SetPropertyFn>,
    methods: AHashMap<String, MethodDef>,
}

impl ClassDef {
    /// Describe a class with a declared constructor.
    pub fn new<T, F>(name: impl Into<String>, params: impl IntoIterator<Item = Param>, constructor: F) -> Self
    where
        T: Injectable,
        F: Fn(ResolvedArgs) -> Result<T> + Send + Sync + 'static,
    {
        Self::concrete::<T>(
            name.into(),
            Construction::Constructor {
                params: params.into_iter().collect(),
                instantiate: Arc::new(move |args: ResolvedArgs| {
                    constructor(args).map(|object| Box::new(object) as Box<dyn Any + Send + Sync>)
                }),
            },
        )
    }

    /// Describe a class without a declared constructor.
    pub fn without_constructor<T: Injectable + Default>(name: impl Into<String>) -> Self {
        Self::concrete::<T>(
            name.into(),
            Construction::Plain(Arc::new(|_: ResolvedArgs| {
                Ok(Box::new(T::default()) as Box<dyn Any + Send + Sync>)
            })),
        )
    }

    /// Describe an abstract class or interface, which is never instantiated.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
            type_name: "<abstract>",
            construction: Construction::Abstract,
            configurable: false,
            properties: AHashMap::new(),
            methods: AHashMap::new(),
        }
    }

    fn concrete<T: Injectable>(name: String, construction: Construction) -> Self {
        Self {
            name,
            type_id: Some(TypeId::of::<T>()),
            type_name: std::any::type_name::<T>(),
            construction,
            configurable: false,
            properties: AHashMap::new(),
            methods: AHashMap::new(),
        }
    }

    /// Mark the class as configurable: its last constructor parameter takes
    /// the override [`Properties`](crate::Properties) directly.
    pub fn configurable(mut self) -> Self {
        self.configurable = true;
        self
    }

    /// Declare a public property that overrides may assign.
    pub fn property<T, V, F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        T: Injectable,
        V: Injectable + Clone,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = name.into();
        let property = name.clone();
        self.properties.insert(
            name,
            Arc::new(move |object: &mut (dyn Any + Send + Sync), value: Value| {
                let object = object.downcast_mut::<T>().ok_or_else(|| {
                    DiError::type_mismatch::<T>(format!("property {property}"))
                })?;
                let value = value
                    .downcast_ref::<V>()
                    .cloned()
                    .ok_or_else(|| DiError::type_mismatch::<V>(format!("property {property}")))?;
                setter(object, value);
                Ok(())
            }),
        );
        self
    }

    /// Declare an invocable method.
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.insert(method.name().to_string(), method);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// TypeId of the concrete type (none for interfaces).
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn is_instantiable(&self) -> bool {
        !matches!(self.construction, Construction::Abstract)
    }

    #[inline]
    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    /// Declared constructor parameters, `None` when there is no constructor.
    pub fn constructor_params(&self) -> Option<&[Param]> {
        match &self.construction {
            Construction::Constructor { params, .. } => Some(params),
            _ => None,
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn method_def(&self, name: &str) -> Option<&MethodDef> {
        self.methods.get(name)
    }

    pub(crate) fn instantiate(&self, args: ResolvedArgs) -> Result<Box<dyn Any + Send + Sync>> {
        match &self.construction {
            Construction::Abstract => Err(DiError::not_instantiable(&self.name)),
            Construction::Plain(instantiate) => instantiate(args),
            Construction::Constructor { instantiate, .. } => instantiate(args),
        }
    }

    pub(crate) fn set_property(
        &self,
        object: &mut (dyn Any + Send + Sync),
        name: &str,
        value: Value,
    ) -> Result<()> {
        let setter = self.properties.get(name).ok_or_else(|| {
            DiError::bad_configuration(&self.name, format!("no public property `{name}`"))
        })?;
        setter(object, value)
    }
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("instantiable", &self.is_instantiable())
            .field("configurable", &self.configurable)
            .field("params", &self.constructor_params())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Types that can describe themselves as a [`ClassDef`].
///
/// Usually derived with `#[derive(Autowire)]` (feature `derive`).
pub trait Autowire: Injectable + Sized {
    fn class_def() -> ClassDef;
}
