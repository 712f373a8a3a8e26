//! # verdict-server
//!
//! HTTP transport and wiring for the verdict policy decision service:
//! configuration, tracing setup, the header-context middleware, route
//! handlers, the development defaults for the result-cache and signer
//! ports, and the server binary's building blocks.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod observability;
pub mod server;
pub mod signer;

pub use cache::InMemoryResultCache;
pub use config::{AppConfig, LoggingConfig, PolicyConfig, ServerConfig};
pub use error::ApiError;
pub use observability::{init_tracing, shutdown_tracing};
pub use server::{AppState, ServerBuilder, VerdictServer, build_app};
pub use signer::LocalSigner;
