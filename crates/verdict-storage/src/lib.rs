//! # verdict-storage
//!
//! Storage abstraction layer for the verdict policy decision service.
//!
//! This crate defines the traits a storage backend must implement. It does
//! not contain any implementation - those are provided by separate crates
//! (`verdict-db-memory` ships the in-memory backend used for development and
//! tests).
//!
//! ## Example
//!
//! ```ignore
//! use verdict_storage::DynPolicyStorage;
//! use verdict_core::PolicyRef;
//!
//! async fn is_locked(storage: &DynPolicyStorage, r: &PolicyRef) -> bool {
//!     storage.policy(r).await.map(|p| p.locked).unwrap_or(false)
//! }
//! ```

mod traits;

pub use traits::{PolicyChangeObserver, PolicyStorage};

/// Type alias for a shared storage trait object.
pub type DynPolicyStorage = std::sync::Arc<dyn PolicyStorage>;
