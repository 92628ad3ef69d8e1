//! Error types for the service container

use thiserror::Error;

/// Errors that can occur while binding, resolving or invoking services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// Logical name or class could not be located
    #[error("Service not found: {name}")]
    NotFound { name: String },

    /// Class is abstract or an interface and cannot be constructed
    #[error("Class is not instantiable: {class}")]
    NotInstantiable { class: String },

    /// A parameter had no supplied value, no resolvable type and no default
    #[error("Missing parameter `{parameter}` while resolving {target}")]
    MissingParameter { parameter: String, target: String },

    /// A callback could not be located or invoked
    #[error("Bad callable {callable}: {reason}")]
    BadCallable { callable: String, reason: String },

    /// A binding or override set is malformed
    #[error("Bad configuration for {name}: {reason}")]
    BadConfiguration { name: String, reason: String },

    /// Circular dependency detected during resolution
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// A value could not be downcast to the requested type
    #[error("Type mismatch for {name}: expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// Constructor or factory failed to create the service
    #[error("Failed to create {name}: {reason}")]
    CreationFailed { name: String, reason: String },
}

impl DiError {
    /// Create a NotFound error
    #[inline]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a NotInstantiable error
    #[inline]
    pub fn not_instantiable(class: impl Into<String>) -> Self {
        Self::NotInstantiable {
            class: class.into(),
        }
    }

    /// Create a MissingParameter error
    #[inline]
    pub fn missing_parameter(parameter: impl Into<String>, target: impl Into<String>) -> Self {
        Self::MissingParameter {
            parameter: parameter.into(),
            target: target.into(),
        }
    }

    /// Create a BadCallable error
    #[inline]
    pub fn bad_callable(callable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadCallable {
            callable: callable.into(),
            reason: reason.into(),
        }
    }

    /// Create a BadConfiguration error
    #[inline]
    pub fn bad_configuration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadConfiguration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error for `T`
    #[inline]
    pub fn type_mismatch<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, DiError>;
