//! Per-request header context.
//!
//! Inbound HTTP headers are flattened at the transport boundary into a
//! [`HeaderContext`] (first value per header name, `host` synthesized from
//! the request) and handed to evaluation, where the `external.http.header`
//! extension function reads from it. Lookups are case-insensitive; names are
//! stored lowercased.

use std::collections::HashMap;

/// A flattened, case-insensitive view of a request's headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderContext {
    headers: HashMap<String, String>,
}

impl HeaderContext {
    /// Creates an empty header context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from name/value pairs, keeping the first value per name.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut ctx = Self::new();
        for (name, value) in pairs {
            ctx.insert_first(name.as_ref(), value.into());
        }
        ctx
    }

    /// Inserts a header unless one with the same name is already present.
    pub fn insert_first(&mut self, name: &str, value: String) {
        self.headers.entry(name.to_ascii_lowercase()).or_insert(value);
    }

    /// Returns the header value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns `true` if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
