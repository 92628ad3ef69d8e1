//! Type-erased values and argument sets
//!
//! Everything that flows through the container (resolved services,
//! constructor arguments, property overrides) is carried as a [`Value`]:
//! a shared, type-erased `Arc<dyn Any + Send + Sync>` that remembers the
//! name of the type it was created from.

use crate::{DiError, Result};
use ahash::AHashMap;
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::sync::Arc;

/// Marker trait for types that can live inside the container.
///
/// Implemented automatically for all `Send + Sync + 'static` types.
pub trait Injectable: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Injectable for T {}

/// A shared, type-erased value.
///
/// Cloning a `Value` clones the `Arc`, so two clones always point at the
/// same object. Use [`Value::ptr_eq`] to compare identity.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a value.
    #[inline]
    pub fn new<T: Injectable>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wrap an existing `Arc` without copying.
    #[inline]
    pub fn from_arc<T: Injectable>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The unit value, returned by callables with nothing to return.
    #[inline]
    pub fn unit() -> Self {
        Self::new(())
    }

    #[inline]
    pub(crate) fn from_boxed(boxed: Box<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self {
            inner: Arc::from(boxed),
            type_name,
        }
    }

    /// Check whether the value holds a `T`.
    #[inline]
    pub fn is<T: Injectable>(&self) -> bool {
        (*self.inner).is::<T>()
    }

    /// Downcast to a shared `Arc<T>`.
    #[inline]
    pub fn downcast<T: Injectable>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Borrow the value as a `T`.
    #[inline]
    pub fn downcast_ref<T: Injectable>(&self) -> Option<&T> {
        (*self.inner).downcast_ref::<T>()
    }

    /// TypeId of the wrapped value (not of the `Arc`).
    #[inline]
    pub fn value_type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Name of the wrapped type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether two values point at the same object.
    #[inline]
    pub fn ptr_eq(a: &Value, b: &Value) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_name)
            .finish()
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::new(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::new(value)
    }
}

impl From<Args> for Value {
    fn from(value: Args) -> Self {
        Value::new(value)
    }
}

impl From<Properties> for Value {
    fn from(value: Properties) -> Self {
        Value::new(value)
    }
}

// =============================================================================
// Args
// =============================================================================

/// A caller-supplied argument set.
///
/// Either an ordered sequence consumed positionally or a name-keyed mapping.
/// The kind is fixed when the set is built.
#[derive(Clone, Debug)]
pub enum Args {
    /// Values consumed in declaration order
    Positional(Vec<Value>),
    /// Values looked up by parameter name
    Named(AHashMap<String, Value>),
}

impl Default for Args {
    fn default() -> Self {
        Args::Positional(Vec::new())
    }
}

impl Args {
    /// An empty argument set.
    #[inline]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a positional argument set.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Args::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Build a named argument set.
    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Args::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Append a positional value.
    ///
    /// An empty named set turns positional. A non-empty named set has no
    /// position to append at and is `BadConfiguration`.
    pub fn push(self, value: impl Into<Value>) -> Result<Self> {
        match self {
            Args::Positional(mut values) => {
                values.push(value.into());
                Ok(Args::Positional(values))
            }
            Args::Named(map) if map.is_empty() => Ok(Args::Positional(vec![value.into()])),
            Args::Named(_) => Err(DiError::bad_configuration(
                "args",
                "cannot append a positional value to a named set",
            )),
        }
    }

    /// Add a named value.
    ///
    /// An empty positional set turns named. A non-empty positional set
    /// would lose the name and is `BadConfiguration`.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        match self {
            Args::Named(mut map) => {
                map.insert(name.into(), value.into());
                Ok(Args::Named(map))
            }
            Args::Positional(values) if values.is_empty() => {
                let mut map = AHashMap::new();
                map.insert(name.into(), value.into());
                Ok(Args::Named(map))
            }
            Args::Positional(_) => Err(DiError::bad_configuration(
                name.into(),
                "cannot add a named value to a positional set",
            )),
        }
    }

    /// Number of supplied values.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Args::Positional(values) => values.len(),
            Args::Named(map) => map.len(),
        }
    }

    /// Whether no values were supplied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is a positional set.
    #[inline]
    pub fn is_positional(&self) -> bool {
        matches!(self, Args::Positional(_))
    }

    /// Positional value at `index`.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Args::Positional(values) => values.get(index),
            Args::Named(_) => None,
        }
    }

    /// Named value for `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Args::Named(map) => map.get(name),
            Args::Positional(_) => None,
        }
    }

    /// Merge binding defaults with per-call arguments.
    ///
    /// Per-call values win: positionally by index, by key for named sets.
    /// When the kinds differ the per-call set replaces the defaults.
    pub fn merged(&self, call: Args) -> Args {
        if call.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return call;
        }
        match (self, call) {
            (Args::Positional(defaults), Args::Positional(mut values)) => {
                if defaults.len() > values.len() {
                    values.extend_from_slice(&defaults[values.len()..]);
                }
                Args::Positional(values)
            }
            (Args::Named(defaults), Args::Named(values)) => {
                let mut merged = defaults.clone();
                merged.extend(values);
                Args::Named(merged)
            }
            (_, call) => call,
        }
    }
}

/// Supplied arguments being consumed by the autowiring resolver.
pub(crate) enum Supplied {
    Positional(VecDeque<Value>),
    Named(AHashMap<String, Value>),
}

impl From<Args> for Supplied {
    fn from(args: Args) -> Self {
        match args {
            Args::Positional(values) => Supplied::Positional(values.into()),
            Args::Named(map) => Supplied::Named(map),
        }
    }
}

impl Supplied {
    /// Whatever has not been consumed, as an argument set.
    pub(crate) fn into_remaining(self) -> Args {
        match self {
            Supplied::Positional(values) => Args::Positional(values.into()),
            Supplied::Named(map) => Args::Named(map),
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

/// A name-keyed property map.
///
/// Used both as the configuration-map form of a binding definition (with a
/// `class` key) and as the override set applied after construction.
#[derive(Clone, Debug, Default)]
pub struct Properties(AHashMap<String, Value>);

impl Properties {
    /// An empty property map.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry and continue the chain.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert an entry, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Remove an entry.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Look up an entry and borrow it as `T`.
    pub fn get_as<T: Injectable>(&self, name: &str) -> Option<&T> {
        self.0.get(name).and_then(Value::downcast_ref::<T>)
    }

    /// Whether an entry exists.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Overlay `other` on top of this map; `other` wins on conflicts.
    pub fn extend(&mut self, other: Properties) {
        self.0.extend(other.0);
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl IntoIterator for Properties {
    type Item = (String, Value);
    type IntoIter = std::collections::hash_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// =============================================================================
// ResolvedArgs
// =============================================================================

/// The ordered argument list produced by autowiring.
///
/// Handed to constructors, methods and callables. Typed accessors report
/// failures against the target being resolved.
#[derive(Clone, Debug)]
pub struct ResolvedArgs {
    target: String,
    values: Vec<Value>,
}

impl ResolvedArgs {
    pub(crate) fn new(target: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            values,
        }
    }

    /// Name of the class, method or function these arguments are for.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Number of arguments.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`.
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| DiError::missing_parameter(format!("#{index}"), &self.target))
    }

    /// Shared `Arc<T>` at `index`.
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>> {
        self.value(index)?
            .downcast::<T>()
            .ok_or_else(|| DiError::type_mismatch::<T>(format!("{} argument #{index}", self.target)))
    }

    /// Owned copy of the `T` at `index`.
    pub fn cloned<T: Injectable + Clone>(&self, index: usize) -> Result<T> {
        self.value(index)?
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| DiError::type_mismatch::<T>(format!("{} argument #{index}", self.target)))
    }

    /// Replace the last argument, returning `false` when there is none.
    pub(crate) fn replace_last(&mut self, value: Value) -> bool {
        match self.values.last_mut() {
            Some(last) => {
                *last = value;
                true
            }
            None => false,
        }
    }

    /// Consume into the raw values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_downcast() {
        let value = Value::new(42u32);
        assert!(value.is::<u32>());
        assert_eq!(*value.downcast::<u32>().unwrap(), 42);
        assert!(value.downcast::<String>().is_none());
        assert_eq!(value.value_type_id(), TypeId::of::<u32>());
    }

    #[test]
    fn test_value_identity() {
        let a = Value::new(String::from("x"));
        let b = a.clone();
        let c = Value::from("x");
        assert!(Value::ptr_eq(&a, &b));
        assert!(!Value::ptr_eq(&a, &c));
    }

    #[test]
    fn test_merge_positional_by_index() {
        let defaults = Args::positional(["a", "b", "c"]);
        let merged = defaults.merged(Args::positional(["x"]));

        let strings: Vec<_> = (0..3)
            .map(|i| merged.at(i).unwrap().downcast_ref::<String>().unwrap().clone())
            .collect();
        assert_eq!(strings, ["x", "b", "c"]);
    }

    #[test]
    fn test_merge_named_call_wins() {
        let defaults = Args::named([("level", "info"), ("path", "/tmp")]);
        let merged = defaults.merged(Args::named([("level", "debug")]));

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("level").unwrap().downcast_ref::<String>().unwrap(), "debug");
        assert_eq!(merged.get("path").unwrap().downcast_ref::<String>().unwrap(), "/tmp");
    }

    #[test]
    fn test_merge_mixed_kinds_call_replaces() {
        let defaults = Args::named([("level", "info")]);
        let merged = defaults.merged(Args::positional(["debug"]));
        assert!(merged.is_positional());
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_args_kind_fixed_by_first_entry() {
        let positional = Args::none().push("a").unwrap().push("b").unwrap();
        assert!(positional.is_positional());
        assert_eq!(positional.len(), 2);

        let named = Args::none().with("a", "b").unwrap().with("c", "d").unwrap();
        assert!(!named.is_positional());
        assert_eq!(named.len(), 2);
    }

    #[test]
    fn test_args_reject_mixed_kinds() {
        let err = Args::positional(["smtp"]).with("port", "25").unwrap_err();
        assert_eq!(
            err,
            DiError::bad_configuration("port", "cannot add a named value to a positional set")
        );

        let err = Args::named([("host", "smtp")]).push("25").unwrap_err();
        assert!(matches!(err, DiError::BadConfiguration { .. }));
    }

    #[test]
    fn test_properties_extend_overrides() {
        let mut base = Properties::new().with("class", "FileLogger").with("level", "info");
        base.extend(Properties::new().with("level", "debug"));

        assert_eq!(base.get_as::<String>("level").unwrap(), "debug");
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_resolved_args_accessors() {
        let args = ResolvedArgs::new("Mailer", vec![Value::from("smtp"), Value::new(25u16)]);

        assert_eq!(args.cloned::<String>(0).unwrap(), "smtp");
        assert_eq!(*args.get::<u16>(1).unwrap(), 25);
        assert!(matches!(
            args.get::<u16>(0),
            Err(DiError::TypeMismatch { .. })
        ));
        assert!(matches!(
            args.value(2),
            Err(DiError::MissingParameter { .. })
        ));
    }
}
