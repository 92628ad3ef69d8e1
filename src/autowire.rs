//! Autowiring resolver
//!
//! Turns a declared parameter list plus a caller-supplied [`Args`] set into
//! the ordered argument list a constructor, method or function expects.
//!
//! Per parameter, in declaration order:
//!
//! 1. variadic: take everything still supplied and stop
//! 2. declared service type: `make` it (does not consume a supplied value)
//! 3. positional set: take the next value
//! 4. named set: the value keyed by the parameter name
//! 5. named set: the value keyed by the snake_case form of the name
//! 6. the declared default
//! 7. otherwise `MissingParameter`

use crate::class::Param;
use crate::value::{Args, ResolvedArgs, Supplied, Value};
use crate::{Container, DiError, Result};

#[cfg(feature = "logging")]
use tracing::trace;

/// Resolve `params` for `target` against the supplied `args`.
pub(crate) fn resolve_parameters(
    container: &Container,
    target: &str,
    params: &[Param],
    args: Args,
) -> Result<ResolvedArgs> {
    let mut supplied = Supplied::from(args);
    let mut values = Vec::with_capacity(params.len());

    for param in params {
        if param.is_variadic() {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_container",
                target_name = target,
                parameter = param.name(),
                source = "variadic",
                "Parameter resolved"
            );
            values.push(Value::new(supplied.into_remaining()));
            return Ok(ResolvedArgs::new(target, values));
        }

        if let Some(service) = param.service_type() {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_container",
                target_name = target,
                parameter = param.name(),
                service = service,
                source = "container",
                "Resolving parameter through container"
            );
            values.push(container.make(service)?);
            continue;
        }

        if let Some(value) = take_supplied(&mut supplied, param.name()) {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_container",
                target_name = target,
                parameter = param.name(),
                source = "supplied",
                "Parameter resolved"
            );
            values.push(value);
            continue;
        }

        if let Some(default) = param.default_value() {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_container",
                target_name = target,
                parameter = param.name(),
                source = "default",
                "Parameter resolved"
            );
            values.push(default.clone());
            continue;
        }

        return Err(DiError::missing_parameter(param.name(), target));
    }

    Ok(ResolvedArgs::new(target, values))
}

/// Steps 3 to 5: positional value, exact name, snake_case name.
fn take_supplied(supplied: &mut Supplied, name: &str) -> Option<Value> {
    match supplied {
        Supplied::Positional(values) => values.pop_front(),
        Supplied::Named(map) => map
            .get(name)
            .or_else(|| map.get(&to_snake_case(name)))
            .cloned(),
    }
}

/// Convert a camelCase or PascalCase name to snake_case.
///
/// Acronyms stay together: `HTTPServer` becomes `http_server`.
pub(crate) fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) => p.is_uppercase() && next.is_some_and(char::is_lowercase),
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}
