//! # verdict-rego
//!
//! Rego evaluation support for the verdict policy decision service: the
//! compiled-policy cache, the extension-function registry, and prepared-query
//! construction around the `regorus` interpreter.
//!
//! The rule language itself is composed, not implemented: `regorus` parses
//! and evaluates the policy source; this crate wires policies, static data,
//! and per-request extension functions into an engine and normalizes the
//! failure modes.

mod cache;
mod eval;
mod extensions;

pub use cache::{CacheStatsSnapshot, PolicyCache};
pub use eval::{DEFAULT_POLICY_FILENAME, PreparedQuery};
pub use extensions::{ExtensionFactory, ExtensionFn, ExtensionRegistry, HTTP_HEADER_FUNC};
