//! The policy service: evaluation, validation, lifecycle control, listing,
//! and change subscription.
//!
//! Evaluation resolves a policy snapshot through the compiled-policy cache,
//! builds a fresh engine bound to the request's headers, executes the query
//! `data.<group>.<name>`, normalizes the result, and persists it in the
//! result cache under the evaluation ID.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, error};
use uuid::Uuid;

use verdict_core::{
    Error, HeaderContext, Kind, Policy, PolicyAutoImport, PolicyRef, Result, Subscriber,
};
use verdict_rego::{ExtensionRegistry, PolicyCache, PreparedQuery};
use verdict_storage::DynPolicyStorage;

use crate::ports::{DynResultCache, DynSigner};
use crate::requests::{
    AutoImportEntry, EvaluateRequest, EvaluateResult, PoliciesQuery, PoliciesResult,
    PolicyListItem, SetAutoImportRequest, SubscribeRequest,
};

/// Options fixed at service construction.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Absolute base URL under which this instance is reachable from the
    /// public internet. Embedded into exported bundles as the base of the
    /// verification-key URL, so verifiers can fetch the public key.
    pub external_hostname: String,
    /// Lock a policy automatically when its output fails schema validation.
    pub validation_lock: bool,
}

/// The policy decision service.
pub struct PolicyService {
    pub(crate) storage: DynPolicyStorage,
    pub(crate) policy_cache: Arc<PolicyCache>,
    pub(crate) cache: DynResultCache,
    pub(crate) signer: DynSigner,
    pub(crate) http_client: reqwest::Client,
    pub(crate) extensions: ExtensionRegistry,
    pub(crate) external_hostname: String,
    pub(crate) validation_lock: bool,
}

impl PolicyService {
    /// Creates the service over its ports.
    pub fn new(
        storage: DynPolicyStorage,
        policy_cache: Arc<PolicyCache>,
        cache: DynResultCache,
        signer: DynSigner,
        http_client: reqwest::Client,
        options: ServiceOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            policy_cache,
            cache,
            signer,
            http_client,
            extensions: ExtensionRegistry::new(),
            external_hostname: options.external_hostname.trim_end_matches('/').to_string(),
            validation_lock: options.validation_lock,
        })
    }

    /// Evaluates a policy with the given input.
    ///
    /// The policy source's package declaration must equal `<group>.<name>`:
    /// evaluating `mygroup/example/1.0` only returns results if the source
    /// declares `package mygroup.example`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown policy, `Forbidden` for a locked one,
    /// `Internal` for evaluation and encoding failures. A `ServiceUnavailable`
    /// result cache does not fail the request.
    pub async fn evaluate(
        &self,
        headers: &HeaderContext,
        req: &EvaluateRequest,
    ) -> Result<EvaluateResult> {
        let evaluation_id = match req.evaluation_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let policy_ref = req.policy_ref();

        let mut query = self
            .prepare_query(&policy_ref, headers)
            .await
            .map_err(|e| {
                error!(policy = %policy_ref, %evaluation_id, error = %e, "error getting prepared query");
                Error::wrap("error evaluating policy", &e)
            })?;

        let result = query.evaluate(&req.input).map_err(|e| {
            error!(policy = %policy_ref, %evaluation_id, error = %e, "error evaluating rego query");
            e
        })?;

        let result = normalize_result(result);

        let encoded = serde_json::to_vec(&result)
            .map_err(|_| Error::internal("error encoding result to json"))?;

        if let Err(e) = self
            .cache
            .set(&evaluation_id, "", "", &encoded, req.ttl)
            .await
        {
            // a temporarily unavailable cache must not fail the evaluation
            if !e.is_service_unavailable() {
                error!(%evaluation_id, error = %e, "error storing policy result in cache");
                return Err(Error::internal("error storing policy result in cache"));
            }
            debug!(%evaluation_id, "result cache unavailable, returning uncached result");
        }

        Ok(EvaluateResult {
            result,
            e_tag: evaluation_id,
        })
    }

    /// Evaluates a policy and validates the output against the policy's
    /// JSON Schema.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the policy has no output schema; `Unknown` wrapping
    /// the violation when validation fails (locking the policy first when
    /// `validation_lock` is configured); evaluation errors as in
    /// [`evaluate`](Self::evaluate).
    pub async fn validate(
        &self,
        headers: &HeaderContext,
        req: &EvaluateRequest,
    ) -> Result<EvaluateResult> {
        let policy_ref = req.policy_ref();
        let policy = self
            .snapshot(&policy_ref)
            .await
            .map_err(|e| Error::wrap("error retrieving policy", &e))?;

        let schema = policy
            .output_schema
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::bad_request("validation schema for policy output is not found")
            })?;

        let res = self.evaluate(headers, req).await?;

        let schema_json: Value = serde_json::from_str(schema)
            .map_err(|_| Error::internal("error compiling output validation schema"))?;
        let validator = jsonschema::validator_for(&schema_json)
            .map_err(|_| Error::internal("error compiling output validation schema"))?;

        if let Err(violation) = validator.validate(&res.result) {
            let violation = violation.to_string();
            if self.validation_lock {
                if let Err(e) = self.lock_policy(&policy).await {
                    error!(policy = %policy_ref, error = %e, "error locking policy after validation failure");
                }
            }
            error!(policy = %policy_ref, %violation, "policy output schema validation failed");
            return Err(Error::wrap_with(
                Kind::Unknown,
                "policy output schema validation failed",
                violation,
            ));
        }

        Ok(res)
    }

    /// Locks a policy so that it cannot be evaluated.
    ///
    /// # Errors
    ///
    /// `NotFound` verbatim for an unknown policy; `Forbidden` when it is
    /// already locked.
    pub async fn lock(&self, policy_ref: &PolicyRef) -> Result<()> {
        let policy = self.fetch_policy(policy_ref, "error locking policy").await?;
        self.lock_policy(&policy).await?;
        debug!(policy = %policy_ref, "policy is locked");
        Ok(())
    }

    async fn lock_policy(&self, policy: &Policy) -> Result<()> {
        if policy.locked {
            return Err(Error::forbidden("policy is already locked"));
        }
        self.storage
            .set_policy_lock(&policy.reference(), true)
            .await
            .map_err(|e| Error::wrap("error locking policy", &e))
    }

    /// Unlocks a policy so it can be evaluated again.
    ///
    /// # Errors
    ///
    /// `NotFound` verbatim for an unknown policy; `Forbidden` when it is not
    /// locked.
    pub async fn unlock(&self, policy_ref: &PolicyRef) -> Result<()> {
        let policy = self.fetch_policy(policy_ref, "error unlocking policy").await?;
        if !policy.locked {
            return Err(Error::forbidden("policy is unlocked"));
        }
        self.storage
            .set_policy_lock(policy_ref, false)
            .await
            .map_err(|e| Error::wrap("error unlocking policy", &e))?;
        debug!(policy = %policy_ref, "policy is unlocked");
        Ok(())
    }

    /// Lists policies with optional filters and field selection.
    ///
    /// # Errors
    ///
    /// Wraps storage failures.
    pub async fn list_policies(&self, req: &PoliciesQuery) -> Result<PoliciesResult> {
        let policies = self
            .storage
            .get_policies(req.locked, req.policy_name.as_deref())
            .await
            .map_err(|e| Error::wrap("error retrieving policies", &e))?;

        let policies = policies
            .into_iter()
            .map(|p| PolicyListItem {
                repository: p.repository,
                group: p.group,
                policy_name: p.name,
                version: p.version,
                locked: p.locked,
                last_update: p.last_update.unix_timestamp(),
                rego: req.rego.then_some(p.rego),
                data: req.data.then(|| p.data.unwrap_or_default()),
                data_config: req.data_config.then(|| p.data_config.unwrap_or_default()),
            })
            .collect();

        Ok(PoliciesResult { policies })
    }

    /// Subscribes a webhook for change events of one policy.
    ///
    /// # Errors
    ///
    /// `NotFound` when the policy does not exist; `Exist` when the same
    /// `(coordinates, webhook, name)` subscription is already present.
    pub async fn subscribe_for_policy_change(&self, req: &SubscribeRequest) -> Result<Subscriber> {
        let policy_ref = req.policy_ref();
        self.storage.policy(&policy_ref).await?;

        match self
            .storage
            .subscriber(&policy_ref, &req.webhook_url, &req.subscriber)
            .await
        {
            Ok(_) => return Err(Error::exist("subscriber already exist")),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(Error::wrap("error while retrieving subscriber", &e)),
        }

        let now = OffsetDateTime::now_utc();
        self.storage
            .create_subscriber(&Subscriber {
                name: req.subscriber.clone(),
                webhook_url: req.webhook_url.clone(),
                policy_repository: req.repository.clone(),
                policy_group: req.group.clone(),
                policy_name: req.policy_name.clone(),
                policy_version: req.version.clone(),
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "error storing policy change subscription");
                e
            })
    }

    /// Enables periodic import of an external policy bundle.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an invalid interval; storage failures wrapped.
    pub async fn set_policy_auto_import(
        &self,
        req: &SetAutoImportRequest,
    ) -> Result<AutoImportEntry> {
        let interval = parse_interval(&req.interval)?;

        self.storage
            .save_auto_import_config(&PolicyAutoImport {
                policy_url: req.policy_url.clone(),
                interval,
                next_import: OffsetDateTime::now_utc() + interval,
            })
            .await
            .map_err(|e| Error::wrap("error saving auto import configuration", &e))?;

        Ok(AutoImportEntry {
            policy_url: req.policy_url.clone(),
            interval: req.interval.clone(),
        })
    }

    /// Lists all auto-import configurations.
    ///
    /// # Errors
    ///
    /// Wraps storage failures.
    pub async fn policy_auto_import(&self) -> Result<Vec<AutoImportEntry>> {
        let configs = self
            .storage
            .auto_import_configs()
            .await
            .map_err(|e| Error::wrap("error getting auto import configurations", &e))?;

        Ok(configs
            .into_iter()
            .map(|c| AutoImportEntry {
                policy_url: c.policy_url,
                interval: humantime::format_duration(c.interval).to_string(),
            })
            .collect())
    }

    /// Removes an auto-import configuration.
    ///
    /// # Errors
    ///
    /// `NotFound` when no configuration exists for the URL.
    pub async fn delete_policy_auto_import(&self, policy_url: &str) -> Result<AutoImportEntry> {
        let config = self
            .storage
            .auto_import_config(policy_url)
            .await
            .map_err(|e| Error::wrap("cannot get auto import configuration", &e))?;

        self.storage
            .delete_auto_import_config(policy_url)
            .await
            .map_err(|e| Error::wrap("failed to delete auto import configuration", &e))?;

        Ok(AutoImportEntry {
            policy_url: config.policy_url,
            interval: humantime::format_duration(config.interval).to_string(),
        })
    }

    /// Resolves an unlocked policy snapshot and compiles it into an
    /// executable query bound to the request's headers.
    async fn prepare_query(
        &self,
        policy_ref: &PolicyRef,
        headers: &HeaderContext,
    ) -> Result<PreparedQuery> {
        let policy = self.snapshot(policy_ref).await?;

        if policy.locked {
            return Err(Error::forbidden("policy is locked"));
        }

        PreparedQuery::prepare(&policy, &self.extensions, headers)
    }

    /// Fetches a policy snapshot through the compiled-policy cache.
    ///
    /// A miss reads storage and inserts the snapshot. The avoided work is
    /// the storage access and the static-data JSON parse; the engine itself
    /// is rebuilt per request.
    pub(crate) async fn snapshot(&self, policy_ref: &PolicyRef) -> Result<Arc<Policy>> {
        let key = policy_ref.fingerprint();
        if let Some(policy) = self.policy_cache.get(&key) {
            return Ok(policy);
        }

        let policy = match self.storage.policy(policy_ref).await {
            Ok(p) => p,
            Err(e) if e.is_not_found() => return Err(e),
            Err(e) => return Err(Error::wrap("error getting policy from storage", &e)),
        };

        let policy = Arc::new(policy);
        self.policy_cache.set(key, Arc::clone(&policy));
        Ok(policy)
    }

    pub(crate) async fn fetch_policy(
        &self,
        policy_ref: &PolicyRef,
        context: &str,
    ) -> Result<Policy> {
        match self.storage.policy(policy_ref).await {
            Ok(p) => Ok(p),
            Err(e) if e.is_not_found() => Err(e),
            Err(e) => Err(Error::wrap(context, &e)),
        }
    }
}

/// Unwraps the blank-assignment convention.
///
/// A policy written as a single `_ = expr` rule surfaces as an object with
/// the sole key `$0`; callers expect the bare value.
fn normalize_result(result: Value) -> Value {
    if let Value::Object(map) = &result {
        if map.len() == 1 {
            if let Some(value) = map.get("$0") {
                return value.clone();
            }
        }
    }
    result
}

/// Parses an auto-import interval string such as `"1m"`.
///
/// A bare number is rejected the way duration parsers conventionally phrase
/// it, so clients see "missing unit in duration".
fn parse_interval(s: &str) -> Result<Duration> {
    match humantime::parse_duration(s) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err(Error::bad_request(
            "invalid interval definition: interval must be positive",
        )),
        Err(e) => {
            let message = if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.') {
                format!("invalid interval definition: missing unit in duration {s:?}")
            } else {
                format!("invalid interval definition: {e}")
            };
            Err(Error::bad_request(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::ports::{ResultCache, Signer};
    use verdict_db_memory::InMemoryStorage;

    // -------------------------------------------------------------------------
    // Stub ports
    // -------------------------------------------------------------------------

    #[derive(Clone, Copy)]
    enum CacheMode {
        Working,
        Unavailable,
        Broken,
    }

    struct RecordingCache {
        mode: CacheMode,
        sets: Mutex<Vec<(String, Vec<u8>, Option<u64>)>>,
    }

    impl RecordingCache {
        fn new(mode: CacheMode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                sets: Mutex::new(Vec::new()),
            })
        }

        fn sets(&self) -> Vec<(String, Vec<u8>, Option<u64>)> {
            self.sets.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ResultCache for RecordingCache {
        async fn set(
            &self,
            key: &str,
            _namespace: &str,
            _scope: &str,
            value: &[u8],
            ttl: Option<u64>,
        ) -> Result<()> {
            self.sets
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_vec(), ttl));
            match self.mode {
                CacheMode::Working => Ok(()),
                CacheMode::Unavailable => Err(Error::service_unavailable("cache is unavailable")),
                CacheMode::Broken => Err(Error::internal("cache write failed")),
            }
        }
    }

    struct StubSigner;

    #[async_trait::async_trait]
    impl Signer for StubSigner {
        async fn key(&self, _namespace: &str, _key: &str) -> Result<Value> {
            Ok(json!({"kty": "EC", "crv": "P-256"}))
        }

        async fn sign(&self, _namespace: &str, _key: &str, _data: &[u8]) -> Result<Vec<u8>> {
            Ok(b"signature".to_vec())
        }
    }

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        policy_cache: Arc<PolicyCache>,
        cache: Arc<RecordingCache>,
        service: Arc<PolicyService>,
    }

    fn fixture(cache_mode: CacheMode, validation_lock: bool) -> Fixture {
        let storage = InMemoryStorage::new_shared();
        let policy_cache = PolicyCache::new_shared();
        let cache = RecordingCache::new(cache_mode);
        let service = PolicyService::new(
            storage.clone(),
            policy_cache.clone(),
            cache.clone(),
            Arc::new(StubSigner),
            reqwest::Client::new(),
            ServiceOptions {
                external_hostname: "https://policies.example.com".into(),
                validation_lock,
            },
        );
        Fixture {
            storage,
            policy_cache,
            cache,
            service,
        }
    }

    fn sample_policy(rego: &str) -> Policy {
        Policy {
            repository: "policies".into(),
            group: "gaiax".into(),
            name: "example".into(),
            version: "1.0".into(),
            rego: rego.into(),
            filename: "example.rego".into(),
            data: None,
            data_config: None,
            output_schema: None,
            export_config: None,
            locked: false,
            last_update: OffsetDateTime::now_utc(),
        }
    }

    fn allow_policy() -> Policy {
        sample_policy(
            "package gaiax.example\n\ndefault allow = false\n\nallow {\n    input.msg == \"yes\"\n}\n",
        )
    }

    fn evaluate_request(input: Value) -> EvaluateRequest {
        EvaluateRequest {
            repository: "policies".into(),
            group: "gaiax".into(),
            policy_name: "example".into(),
            version: "1.0".into(),
            input,
            ttl: None,
            evaluation_id: None,
        }
    }

    // -------------------------------------------------------------------------
    // Evaluate
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_evaluate_returns_result_and_caches_it() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(allow_policy());

        let res = f
            .service
            .evaluate(&HeaderContext::new(), &evaluate_request(json!({"msg": "yes"})))
            .await
            .unwrap();

        assert_eq!(res.result, json!({"allow": true}));
        assert!(!res.e_tag.is_empty());

        let sets = f.cache.sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, res.e_tag);
        assert_eq!(sets[0].1, br#"{"allow":true}"#);
    }

    #[tokio::test]
    async fn test_evaluate_uses_caller_evaluation_id_and_ttl() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(allow_policy());

        let mut req = evaluate_request(json!({"msg": "yes"}));
        req.evaluation_id = Some("eval-42".into());
        req.ttl = Some(30);

        let res = f.service.evaluate(&HeaderContext::new(), &req).await.unwrap();

        assert_eq!(res.e_tag, "eval-42");
        let sets = f.cache.sets();
        assert_eq!(sets[0].0, "eval-42");
        assert_eq!(sets[0].2, Some(30));
    }

    #[tokio::test]
    async fn test_evaluate_locked_policy_is_forbidden() {
        let f = fixture(CacheMode::Working, false);
        let mut policy = allow_policy();
        policy.locked = true;
        f.storage.seed_policy(policy);

        let err = f
            .service
            .evaluate(&HeaderContext::new(), &evaluate_request(json!({"msg": "yes"})))
            .await
            .unwrap_err();

        assert!(err.is_forbidden());
        assert!(err.to_string().contains("policy is locked"));
    }

    #[tokio::test]
    async fn test_evaluate_unknown_policy_is_not_found() {
        let f = fixture(CacheMode::Working, false);

        let err = f
            .service
            .evaluate(&HeaderContext::new(), &evaluate_request(json!({})))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_evaluate_survives_unavailable_result_cache() {
        let f = fixture(CacheMode::Unavailable, false);
        f.storage.seed_policy(allow_policy());

        let res = f
            .service
            .evaluate(&HeaderContext::new(), &evaluate_request(json!({"msg": "yes"})))
            .await
            .unwrap();

        assert_eq!(res.result, json!({"allow": true}));
    }

    #[tokio::test]
    async fn test_evaluate_fails_on_broken_result_cache() {
        let f = fixture(CacheMode::Broken, false);
        f.storage.seed_policy(allow_policy());

        let err = f
            .service
            .evaluate(&HeaderContext::new(), &evaluate_request(json!({"msg": "yes"})))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("error storing policy result in cache"));
    }

    #[tokio::test]
    async fn test_evaluate_reuses_cached_snapshot() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(allow_policy());

        let req = evaluate_request(json!({"msg": "yes"}));
        f.service.evaluate(&HeaderContext::new(), &req).await.unwrap();
        f.service.evaluate(&HeaderContext::new(), &req).await.unwrap();

        let stats = f.policy_cache.stats();
        assert_eq!(stats.insertions, 1);
        assert!(stats.hits >= 1);
    }

    #[tokio::test]
    async fn test_evaluate_observes_saved_policy() {
        use verdict_storage::{PolicyChangeObserver, PolicyStorage};

        let f = fixture(CacheMode::Working, false);
        f.storage.add_policy_subscribers(vec![
            f.policy_cache.clone() as Arc<dyn PolicyChangeObserver>,
        ]);
        f.storage.seed_policy(allow_policy());

        let req = evaluate_request(json!({"msg": "yes"}));
        let res = f.service.evaluate(&HeaderContext::new(), &req).await.unwrap();
        assert_eq!(res.result, json!({"allow": true}));

        // flip the rule and save through storage; the purge must drop the
        // cached snapshot so the next evaluation sees the new source
        let updated = sample_policy(
            "package gaiax.example\n\ndefault allow = false\n\nallow {\n    input.msg == \"no\"\n}\n",
        );
        f.storage.save_policy(&updated).await.unwrap();

        let res = f.service.evaluate(&HeaderContext::new(), &req).await.unwrap();
        assert_eq!(res.result, json!({"allow": false}));
    }

    #[tokio::test]
    async fn test_evaluate_passes_headers_to_policy() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(sample_policy(
            "package gaiax.example\n\ntoken := external.http.header(\"Authorization\")\n",
        ));

        let headers = HeaderContext::from_pairs([("Authorization", "my-token")]);
        let res = f
            .service
            .evaluate(&headers, &evaluate_request(json!({})))
            .await
            .unwrap();

        assert_eq!(res.result, json!({"token": "my-token"}));
    }

    #[test]
    fn test_normalize_result_unwraps_blank_assignment() {
        let wrapped = json!({"$0": {"hello": "world"}});
        assert_eq!(normalize_result(wrapped), json!({"hello": "world"}));
    }

    #[test]
    fn test_normalize_result_keeps_other_shapes() {
        let multi = json!({"$0": 1, "allow": true});
        assert_eq!(normalize_result(multi.clone()), multi);

        let plain = json!({"allow": true});
        assert_eq!(normalize_result(plain.clone()), plain);

        let scalar = json!(42);
        assert_eq!(normalize_result(scalar.clone()), scalar);
    }

    // -------------------------------------------------------------------------
    // Validate
    // -------------------------------------------------------------------------

    fn schema_policy(result_rule: &str) -> Policy {
        let mut policy = sample_policy(&format!("package gaiax.example\n\n{result_rule}\n"));
        policy.output_schema = Some(
            r#"{
                "type": "object",
                "required": ["foo"],
                "properties": {"foo": {"type": "string", "minLength": 5}}
            }"#
            .into(),
        );
        policy
    }

    #[tokio::test]
    async fn test_validate_requires_output_schema() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(allow_policy());

        let err = f
            .service
            .validate(&HeaderContext::new(), &evaluate_request(json!({"msg": "yes"})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::BadRequest);
        assert!(err.to_string().contains("validation schema for policy output is not found"));
    }

    #[tokio::test]
    async fn test_validate_violation_is_unknown() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(schema_policy("foo := \"bar\""));

        let err = f
            .service
            .validate(&HeaderContext::new(), &evaluate_request(json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::Unknown);
        assert!(err.to_string().contains("policy output schema validation failed"));
    }

    #[tokio::test]
    async fn test_validate_violation_locks_policy_when_configured() {
        let f = fixture(CacheMode::Working, true);
        let policy = schema_policy("foo := \"bar\"");
        let policy_ref = policy.reference();
        f.storage.seed_policy(policy);

        let err = f
            .service
            .validate(&HeaderContext::new(), &evaluate_request(json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Kind::Unknown);

        use verdict_storage::PolicyStorage;
        assert!(f.storage.policy(&policy_ref).await.unwrap().locked);
    }

    #[tokio::test]
    async fn test_validate_success_returns_result() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(schema_policy("foo := \"barbaz\""));

        let res = f
            .service
            .validate(&HeaderContext::new(), &evaluate_request(json!({})))
            .await
            .unwrap();

        assert_eq!(res.result, json!({"foo": "barbaz"}));
    }

    // -------------------------------------------------------------------------
    // Lock / Unlock
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_lock_and_unlock_flow() {
        let f = fixture(CacheMode::Working, false);
        let policy = allow_policy();
        let policy_ref = policy.reference();
        f.storage.seed_policy(policy);

        f.service.lock(&policy_ref).await.unwrap();
        let err = f.service.lock(&policy_ref).await.unwrap_err();
        assert!(err.is_forbidden());
        assert!(err.to_string().contains("policy is already locked"));

        f.service.unlock(&policy_ref).await.unwrap();
        let err = f.service.unlock(&policy_ref).await.unwrap_err();
        assert!(err.is_forbidden());
        assert!(err.to_string().contains("policy is unlocked"));
    }

    #[tokio::test]
    async fn test_lock_unknown_policy_is_not_found() {
        let f = fixture(CacheMode::Working, false);
        let err = f
            .service
            .lock(&PolicyRef::new("r", "g", "n", "1.0"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    // -------------------------------------------------------------------------
    // ListPolicies
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_policies_field_selection() {
        let f = fixture(CacheMode::Working, false);
        let mut policy = allow_policy();
        policy.data = Some(r#"{"hello":"world"}"#.into());
        let last_update = policy.last_update.unix_timestamp();
        f.storage.seed_policy(policy);

        let bare = f
            .service
            .list_policies(&PoliciesQuery::default())
            .await
            .unwrap();
        assert_eq!(bare.policies.len(), 1);
        assert_eq!(bare.policies[0].last_update, last_update);
        assert!(bare.policies[0].rego.is_none());
        assert!(bare.policies[0].data.is_none());

        let full = f
            .service
            .list_policies(&PoliciesQuery {
                rego: true,
                data: true,
                data_config: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(full.policies[0].rego.as_deref().unwrap().contains("package gaiax.example"));
        assert_eq!(full.policies[0].data.as_deref(), Some(r#"{"hello":"world"}"#));
        assert_eq!(full.policies[0].data_config.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_list_policies_locked_filter() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(allow_policy());
        let mut locked = allow_policy();
        locked.name = "locked".into();
        locked.rego = "package gaiax.locked\n\nallow = true".into();
        locked.locked = true;
        f.storage.seed_policy(locked);

        let res = f
            .service
            .list_policies(&PoliciesQuery {
                locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(res.policies.len(), 1);
        assert!(res.policies[0].locked);
    }

    // -------------------------------------------------------------------------
    // SubscribeForPolicyChange
    // -------------------------------------------------------------------------

    fn subscribe_request() -> SubscribeRequest {
        SubscribeRequest {
            repository: "policies".into(),
            group: "gaiax".into(),
            policy_name: "example".into(),
            version: "1.0".into(),
            webhook_url: "https://hooks.example.com/policy".into(),
            subscriber: "reporting".into(),
        }
    }

    #[tokio::test]
    async fn test_subscribe_unknown_policy_is_not_found() {
        let f = fixture(CacheMode::Working, false);
        let err = f
            .service
            .subscribe_for_policy_change(&subscribe_request())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_subscribe_is_created_once() {
        let f = fixture(CacheMode::Working, false);
        f.storage.seed_policy(allow_policy());

        let created = f
            .service
            .subscribe_for_policy_change(&subscribe_request())
            .await
            .unwrap();
        assert_eq!(created.name, "reporting");
        assert_eq!(created.webhook_url, "https://hooks.example.com/policy");

        let err = f
            .service
            .subscribe_for_policy_change(&subscribe_request())
            .await
            .unwrap_err();
        assert!(err.is_exist());
    }

    // -------------------------------------------------------------------------
    // Auto-import configuration
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_set_policy_auto_import_rejects_missing_unit() {
        let f = fixture(CacheMode::Working, false);

        let err = f
            .service
            .set_policy_auto_import(&SetAutoImportRequest {
                policy_url: "https://bundles.example.com/policy.zip".into(),
                interval: "1".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::BadRequest);
        assert!(err.to_string().contains("missing unit in duration"));
    }

    #[tokio::test]
    async fn test_set_policy_auto_import_stores_config() {
        use verdict_storage::PolicyStorage;

        let f = fixture(CacheMode::Working, false);
        let before = OffsetDateTime::now_utc();

        let entry = f
            .service
            .set_policy_auto_import(&SetAutoImportRequest {
                policy_url: "https://bundles.example.com/policy.zip".into(),
                interval: "1m".into(),
            })
            .await
            .unwrap();
        assert_eq!(entry.interval, "1m");

        let config = f
            .storage
            .auto_import_config("https://bundles.example.com/policy.zip")
            .await
            .unwrap();
        assert_eq!(config.interval, Duration::from_secs(60));
        let expected = before + Duration::from_secs(60);
        assert!(config.next_import >= expected - time::Duration::seconds(2));
        assert!(config.next_import <= expected + time::Duration::seconds(2));
    }

    #[tokio::test]
    async fn test_auto_import_list_and_delete() {
        let f = fixture(CacheMode::Working, false);
        f.service
            .set_policy_auto_import(&SetAutoImportRequest {
                policy_url: "https://bundles.example.com/policy.zip".into(),
                interval: "1m".into(),
            })
            .await
            .unwrap();

        let entries = f.service.policy_auto_import().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].interval, "1m");

        let removed = f
            .service
            .delete_policy_auto_import("https://bundles.example.com/policy.zip")
            .await
            .unwrap();
        assert_eq!(removed.policy_url, "https://bundles.example.com/policy.zip");

        let err = f
            .service
            .delete_policy_auto_import("https://bundles.example.com/policy.zip")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));

        let err = parse_interval("1").unwrap_err();
        assert!(err.to_string().contains("missing unit in duration"));

        let err = parse_interval("0s").unwrap_err();
        assert!(err.to_string().contains("positive"));

        assert!(parse_interval("soon").is_err());
    }
}

