//! Binding definitions
//!
//! A binding tells the container how to produce an object for a logical
//! name: run a factory, or build a class with optional property overrides.
//! A bare class name is stored as a configuration map holding only `class`.

use crate::value::{Args, Properties, Value};
use crate::{Container, DiError, Result};
use std::sync::Arc;

/// Key of the class entry in a configuration-map definition
pub const CLASS_KEY: &str = "class";

/// Type-erased factory function
pub type FactoryFn = Arc<dyn Fn(&Container, &Args, &Properties) -> Result<Value> + Send + Sync>;

/// How a binding produces its object
#[derive(Clone)]
pub enum Definition {
    /// Callable invoked with `(container, merged_args, overrides)`
    Factory(FactoryFn),
    /// Configuration map with a `class` entry plus property overrides
    Config(Properties),
}

impl Definition {
    /// Bind to a concrete class.
    pub fn class(name: impl Into<String>) -> Self {
        Definition::Config(Properties::new().with(CLASS_KEY, name.into()))
    }

    /// Bind to a factory.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Container, &Args, &Properties) -> Result<Value> + Send + Sync + 'static,
    {
        Definition::Factory(Arc::new(factory))
    }

    /// Bind to a configuration map (`class` plus overrides).
    pub fn config(map: Properties) -> Self {
        Definition::Config(map)
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, Definition::Factory(_))
    }
}

impl From<&str> for Definition {
    fn from(class: &str) -> Self {
        Definition::class(class)
    }
}

impl From<String> for Definition {
    fn from(class: String) -> Self {
        Definition::class(class)
    }
}

impl From<Properties> for Definition {
    fn from(map: Properties) -> Self {
        Definition::Config(map)
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Definition::Factory(_) => f.write_str("Factory(..)"),
            Definition::Config(map) => f.debug_tuple("Config").field(map).finish(),
        }
    }
}

/// An installed binding
#[derive(Clone, Debug)]
pub struct Binding {
    pub definition: Definition,
    /// Default constructor arguments, overridden by per-call arguments
    pub args: Args,
    pub singleton: bool,
}

// =============================================================================
// Batch entries
// =============================================================================

/// One entry of a [`Container::bind_many`] batch.
///
/// Built from a definition alone, or from the tuples
/// `(definition, args)`, `(definition, singleton)` and
/// `(definition, args, singleton)`.
#[derive(Clone, Debug)]
pub struct BindEntry {
    pub definition: Definition,
    pub args: Args,
    pub singleton: bool,
}

impl BindEntry {
    pub fn new(definition: impl Into<Definition>) -> Self {
        Self {
            definition: definition.into(),
            args: Args::none(),
            singleton: false,
        }
    }

    /// Build an entry from an untyped list of 1 to 3 values.
    ///
    /// The first value is the definition (a [`Definition`], a class name or a
    /// [`Properties`] map). A second value is disambiguated by type: `bool`
    /// is the singleton flag, [`Args`] are default arguments. Anything else is
    /// rejected.
    pub fn from_values(name: &str, values: Vec<Value>) -> Result<Self> {
        let mut values = values.into_iter();
        let definition = match values.next() {
            Some(first) => definition_from_value(name, &first)?,
            None => return Err(DiError::bad_configuration(name, "empty binding entry")),
        };
        let mut entry = BindEntry::new(definition);

        match (values.next(), values.next(), values.next()) {
            (None, None, None) => {}
            (Some(second), None, None) => {
                if let Some(singleton) = second.downcast_ref::<bool>() {
                    entry.singleton = *singleton;
                } else if let Some(args) = second.downcast_ref::<Args>() {
                    entry.args = args.clone();
                } else {
                    return Err(DiError::bad_configuration(
                        name,
                        format!(
                            "second entry must be arguments or a singleton flag, got {}",
                            second.type_name()
                        ),
                    ));
                }
            }
            (Some(args), Some(singleton), None) => {
                entry.args = args.downcast_ref::<Args>().cloned().ok_or_else(|| {
                    DiError::bad_configuration(name, "second entry must be arguments")
                })?;
                entry.singleton = *singleton.downcast_ref::<bool>().ok_or_else(|| {
                    DiError::bad_configuration(name, "third entry must be a singleton flag")
                })?;
            }
            _ => {
                return Err(DiError::bad_configuration(
                    name,
                    "binding entry takes at most 3 values",
                ));
            }
        }

        Ok(entry)
    }
}

fn definition_from_value(name: &str, value: &Value) -> Result<Definition> {
    if let Some(definition) = value.downcast_ref::<Definition>() {
        Ok(definition.clone())
    } else if let Some(class) = value.downcast_ref::<String>() {
        Ok(Definition::class(class.clone()))
    } else if let Some(map) = value.downcast_ref::<Properties>() {
        Ok(Definition::Config(map.clone()))
    } else {
        Err(DiError::bad_configuration(
            name,
            format!("{} is not a binding definition", value.type_name()),
        ))
    }
}

impl From<Definition> for BindEntry {
    fn from(definition: Definition) -> Self {
        BindEntry::new(definition)
    }
}

impl From<&str> for BindEntry {
    fn from(class: &str) -> Self {
        BindEntry::new(class)
    }
}

impl From<(Definition, bool)> for BindEntry {
    fn from((definition, singleton): (Definition, bool)) -> Self {
        Self {
            singleton,
            ..BindEntry::new(definition)
        }
    }
}

impl From<(Definition, Args)> for BindEntry {
    fn from((definition, args): (Definition, Args)) -> Self {
        Self {
            args,
            ..BindEntry::new(definition)
        }
    }
}

impl From<(Definition, Args, bool)> for BindEntry {
    fn from((definition, args, singleton): (Definition, Args, bool)) -> Self {
        Self {
            definition,
            args,
            singleton,
        }
    }
}
