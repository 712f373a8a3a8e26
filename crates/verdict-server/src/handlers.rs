//! HTTP handlers mapping the policy and bundle services onto axum routes.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use verdict_core::{HeaderContext, PolicyRef};
use verdict_service::{EvaluateRequest, PoliciesQuery, SetAutoImportRequest, SubscribeRequest};

use crate::error::ApiError;
use crate::server::AppState;

type Coordinates = Path<(String, String, String, String)>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    /// TTL (seconds) for the cached evaluation result.
    pub ttl: Option<u64>,
    /// Caller-supplied evaluation ID reused as the cache key.
    pub evaluation_id: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readiness() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}

fn coordinates(
    (repository, group, name, version): (String, String, String, String),
) -> Result<PolicyRef, ApiError> {
    let policy_ref = PolicyRef::new(repository, group, name, version);
    policy_ref.validate()?;
    Ok(policy_ref)
}

pub async fn evaluate(
    State(state): State<AppState>,
    Path(coords): Coordinates,
    Query(params): Query<EvaluateParams>,
    Extension(headers): Extension<HeaderContext>,
    Json(input): Json<Value>,
) -> Result<Response, ApiError> {
    let policy_ref = coordinates(coords)?;
    let req = evaluate_request(policy_ref, params, input);

    let res = state.service.evaluate(&headers, &req).await?;
    Ok(evaluation_response(res))
}

pub async fn validate(
    State(state): State<AppState>,
    Path(coords): Coordinates,
    Query(params): Query<EvaluateParams>,
    Extension(headers): Extension<HeaderContext>,
    Json(input): Json<Value>,
) -> Result<Response, ApiError> {
    let policy_ref = coordinates(coords)?;
    let req = evaluate_request(policy_ref, params, input);

    let res = state.service.validate(&headers, &req).await?;
    Ok(evaluation_response(res))
}

fn evaluate_request(
    policy_ref: PolicyRef,
    params: EvaluateParams,
    input: Value,
) -> EvaluateRequest {
    EvaluateRequest {
        repository: policy_ref.repository,
        group: policy_ref.group,
        policy_name: policy_ref.name,
        version: policy_ref.version,
        input,
        ttl: params.ttl,
        evaluation_id: params.evaluation_id,
    }
}

fn evaluation_response(res: verdict_service::EvaluateResult) -> Response {
    ([(header::ETAG, res.e_tag)], Json(res.result)).into_response()
}

pub async fn lock(
    State(state): State<AppState>,
    Path(coords): Coordinates,
) -> Result<StatusCode, ApiError> {
    let policy_ref = coordinates(coords)?;
    state.service.lock(&policy_ref).await?;
    Ok(StatusCode::OK)
}

pub async fn unlock(
    State(state): State<AppState>,
    Path(coords): Coordinates,
) -> Result<StatusCode, ApiError> {
    let policy_ref = coordinates(coords)?;
    state.service.unlock(&policy_ref).await?;
    Ok(StatusCode::OK)
}

pub async fn list_policies(
    State(state): State<AppState>,
    Query(query): Query<PoliciesQuery>,
) -> Result<Response, ApiError> {
    let res = state.service.list_policies(&query).await?;
    Ok(Json(res).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    pub webhook_url: String,
    pub subscriber: String,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Path(coords): Coordinates,
    Json(body): Json<SubscribeBody>,
) -> Result<Response, ApiError> {
    let policy_ref = coordinates(coords)?;
    let req = SubscribeRequest {
        repository: policy_ref.repository,
        group: policy_ref.group,
        policy_name: policy_ref.name,
        version: policy_ref.version,
        webhook_url: body.webhook_url,
        subscriber: body.subscriber,
    };

    let subscriber = state.service.subscribe_for_policy_change(&req).await?;
    Ok(Json(subscriber).into_response())
}

pub async fn export_bundle(
    State(state): State<AppState>,
    Path(coords): Coordinates,
) -> Result<Response, ApiError> {
    let policy_ref = coordinates(coords)?;
    let res = state.service.export_bundle(&policy_ref).await?;

    Ok((
        [
            (header::CONTENT_TYPE, res.content_type.to_string()),
            (header::CONTENT_LENGTH, res.content_length.to_string()),
            (header::CONTENT_DISPOSITION, res.content_disposition),
        ],
        res.archive,
    )
        .into_response())
}

pub async fn policy_public_key(
    State(state): State<AppState>,
    Path(coords): Coordinates,
) -> Result<Response, ApiError> {
    let policy_ref = coordinates(coords)?;
    let key = state.service.policy_public_key(&policy_ref).await?;
    Ok(Json(key).into_response())
}

pub async fn import_bundle(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let summary = state.service.import_bundle(&body).await?;
    Ok(Json(summary).into_response())
}

pub async fn set_auto_import(
    State(state): State<AppState>,
    Json(req): Json<SetAutoImportRequest>,
) -> Result<Response, ApiError> {
    let entry = state.service.set_policy_auto_import(&req).await?;
    Ok(Json(entry).into_response())
}

pub async fn list_auto_import(State(state): State<AppState>) -> Result<Response, ApiError> {
    let entries = state.service.policy_auto_import().await?;
    // an empty json array instead of null
    Ok(Json(json!({ "autoimport": entries })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAutoImportParams {
    pub policy_url: String,
}

pub async fn delete_auto_import(
    State(state): State<AppState>,
    Query(params): Query<DeleteAutoImportParams>,
) -> Result<Response, ApiError> {
    let entry = state
        .service
        .delete_policy_auto_import(&params.policy_url)
        .await?;
    Ok(Json(entry).into_response())
}
