//! Application wiring and the HTTP server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use verdict_core::{Error, Kind, Result};
use verdict_db_memory::InMemoryStorage;
use verdict_rego::PolicyCache;
use verdict_service::{AutoImporter, ChangeNotifier, PolicyService, ServiceOptions};
use verdict_storage::{DynPolicyStorage, PolicyChangeObserver};

use crate::cache::InMemoryResultCache;
use crate::config::AppConfig;
use crate::handlers;
use crate::headers::header_context;
use crate::signer::LocalSigner;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PolicyService>,
}

/// Builds the application router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/liveness", get(handlers::liveness))
        .route("/readiness", get(handlers::readiness))
        .route("/policies", get(handlers::list_policies))
        .route("/policy/import", post(handlers::import_bundle))
        .route(
            "/policy/import/config",
            post(handlers::set_auto_import)
                .get(handlers::list_auto_import)
                .delete(handlers::delete_auto_import),
        )
        .route(
            "/policy/{repository}/{group}/{name}/{version}/evaluation",
            post(handlers::evaluate),
        )
        .route(
            "/policy/{repository}/{group}/{name}/{version}/validation",
            post(handlers::validate),
        )
        .route(
            "/policy/{repository}/{group}/{name}/{version}/lock",
            post(handlers::lock).delete(handlers::unlock),
        )
        .route(
            "/policy/{repository}/{group}/{name}/{version}/export",
            get(handlers::export_bundle),
        )
        .route(
            "/policy/{repository}/{group}/{name}/{version}/key",
            get(handlers::policy_public_key),
        )
        .route(
            "/policy/{repository}/{group}/{name}/{version}/notifychange",
            post(handlers::subscribe),
        )
        .layer(middleware::from_fn(header_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builder assembling storage, caches, signer, service, and background
/// tasks into a runnable server.
pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Wires the application together and starts the background tasks.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client or the signing key cannot be
    /// built.
    pub fn build(self) -> Result<VerdictServer> {
        let http_client = reqwest::Client::builder()
            .timeout(self.config.http_timeout())
            .build()
            .map_err(|e| Error::wrap_with(Kind::Internal, "error building http client", e))?;

        let storage: DynPolicyStorage = InMemoryStorage::new_shared();
        let policy_cache = PolicyCache::new_shared();
        let notifier = Arc::new(ChangeNotifier::new(storage.clone(), http_client.clone()));

        // any policy change purges the compiled-policy cache and fans out to
        // the subscriber webhooks
        storage.add_policy_subscribers(vec![
            policy_cache.clone() as Arc<dyn PolicyChangeObserver>,
            notifier,
        ]);

        let service = PolicyService::new(
            storage.clone(),
            policy_cache,
            Arc::new(InMemoryResultCache::new()),
            Arc::new(LocalSigner::generate()?),
            http_client.clone(),
            ServiceOptions {
                external_hostname: self.config.policy.external_hostname.clone(),
                validation_lock: self.config.policy.validation_lock,
            },
        );

        let importer_shutdown = AutoImporter::new(
            storage.clone(),
            service.clone(),
            http_client,
            self.config.import_poll_interval(),
        )
        .start();

        let (listener_shutdown, listener_rx) = watch::channel(false);
        tokio::spawn({
            let storage = storage.clone();
            async move {
                if let Err(e) = storage.listen_policy_data_changes(listener_rx).await {
                    error!(error = %e, "policy data change listener failed");
                }
            }
        });

        Ok(VerdictServer {
            config: self.config,
            state: AppState { service },
            storage,
            importer_shutdown,
            listener_shutdown,
        })
    }
}

/// The assembled server and the handles of its background tasks.
pub struct VerdictServer {
    config: AppConfig,
    state: AppState,
    storage: DynPolicyStorage,
    importer_shutdown: watch::Sender<bool>,
    listener_shutdown: watch::Sender<bool>,
}

impl VerdictServer {
    /// Serves requests until the listener fails, then tears down the
    /// background tasks and the storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the listen address cannot be bound.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::wrap_with(Kind::Internal, format!("error binding {addr}"), e))?;

        info!(%addr, "verdict server listening");

        let app = build_app(self.state);
        let served = axum::serve(listener, app)
            .await
            .map_err(|e| Error::wrap_with(Kind::Internal, "server error", e));

        let _ = self.importer_shutdown.send(true);
        let _ = self.listener_shutdown.send(true);
        self.storage.close().await;

        served
    }
}
