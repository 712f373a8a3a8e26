//! # verdict-core
//!
//! Domain types shared by every verdict crate: the kinded error model, the
//! policy entity and its coordinate tuple, webhook subscribers, auto-import
//! configuration, and the per-request header context.
//!
//! This crate holds no I/O. Ports (storage, result cache, signer) and their
//! implementations live in the sibling crates.

mod error;
mod headers;
mod policy;

pub use error::{Error, Kind, Result};
pub use headers::HeaderContext;
pub use policy::{ExportConfig, Policy, PolicyAutoImport, PolicyRef, Subscriber};
