//! Extension-function registry.
//!
//! Enumerates the functions injected into every evaluation beyond the Rego
//! builtins. Functions are registered as factories: at evaluation time each
//! factory is given the request's [`HeaderContext`] and produces the closure
//! installed into the engine, so per-request state (the header map) is bound
//! fresh on every call.

use std::sync::Arc;

use regorus::Value;

use verdict_core::{Error, HeaderContext, Kind};

/// Name of the header-accessor function available to policies.
pub const HTTP_HEADER_FUNC: &str = "external.http.header";

/// A function installed into the engine, in the shape the interpreter expects.
pub type ExtensionFn = Box<dyn regorus::Extension>;
/// Builds an [`ExtensionFn`] bound to a request's header context.
pub type ExtensionFactory = Arc<dyn Fn(&HeaderContext) -> ExtensionFn + Send + Sync>;

struct Registration {
    name: String,
    nargs: u8,
    factory: ExtensionFactory,
}

/// Registry of extension functions installed into each evaluation.
pub struct ExtensionRegistry {
    registrations: Vec<Registration>,
}

impl ExtensionRegistry {
    /// Creates a registry holding the built-in functions.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            registrations: Vec::new(),
        };
        registry.register(HTTP_HEADER_FUNC, 1, Arc::new(http_header_fn));
        registry
    }

    /// Registers an additional extension function.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        nargs: u8,
        factory: ExtensionFactory,
    ) {
        self.registrations.push(Registration {
            name: name.into(),
            nargs,
            factory,
        });
    }

    /// Names of all registered functions.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.name.as_str()).collect()
    }

    /// Installs every registered function into the engine, binding the
    /// request's header context.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the engine rejects a registration.
    pub fn install(
        &self,
        engine: &mut regorus::Engine,
        headers: &HeaderContext,
    ) -> Result<(), Error> {
        for registration in &self.registrations {
            let func = (registration.factory)(headers);
            engine
                .add_extension(registration.name.clone(), registration.nargs, func)
                .map_err(|e| {
                    Error::wrap_with(
                        Kind::Internal,
                        format!("error registering rego function {}", registration.name),
                        e,
                    )
                })?;
        }
        Ok(())
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the `external.http.header(name)` function over a header map.
///
/// Returns the first value of the named header, or an empty string when the
/// header is absent.
fn http_header_fn(headers: &HeaderContext) -> ExtensionFn {
    let headers = headers.clone();
    Box::new(move |args: Vec<Value>| {
        let name = args[0].as_string()?;
        let value = headers.get(name.as_ref()).unwrap_or_default();
        Ok(Value::from(value.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_builtins() {
        let registry = ExtensionRegistry::new();
        assert_eq!(registry.names(), vec![HTTP_HEADER_FUNC]);
    }

    #[test]
    fn test_http_header_returns_value() {
        let headers = HeaderContext::from_pairs([("Authorization", "my-token")]);
        let mut func = http_header_fn(&headers);

        let result = func(vec![Value::from("Authorization")]).unwrap();
        assert_eq!(result, Value::from("my-token"));
    }

    #[test]
    fn test_http_header_missing_is_empty_string() {
        let headers = HeaderContext::new();
        let mut func = http_header_fn(&headers);

        let result = func(vec![Value::from("Authorization")]).unwrap();
        assert_eq!(result, Value::from(""));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ExtensionRegistry::new();
        registry.register(
            "external.test.echo",
            1,
            Arc::new(|_headers| Box::new(|args: Vec<Value>| Ok(args[0].clone()))),
        );

        assert!(registry.names().contains(&"external.test.echo"));
    }
}
