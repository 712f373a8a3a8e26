//! # verdict-service
//!
//! The verdict policy decision service: policy evaluation and validation,
//! lock lifecycle, listing, change subscriptions, signed-bundle export and
//! import, the auto-import scheduler, and the webhook change notifier.
//!
//! Storage, the result cache, and the signer are ports; the transport layer
//! in `verdict-server` maps the service operations onto HTTP.

mod bundle;
mod importer;
mod notifier;
mod ports;
mod requests;
mod service;

pub use importer::AutoImporter;
pub use notifier::{ChangeNotifier, PolicyChangeEvent};
pub use ports::{DynResultCache, DynSigner, ResultCache, Signer};
pub use requests::{
    AutoImportEntry, EvaluateRequest, EvaluateResult, ExportBundleResult, ImportSummary,
    PoliciesQuery, PoliciesResult, PolicyListItem, SetAutoImportRequest, SubscribeRequest,
};
pub use service::{PolicyService, ServiceOptions};
