//! Axum request handlers for all service endpoints.
//!
//! Every field-keyed verb takes a JSON object body and answers with a
//! [`BatchResponse`]. Request-fatal failures are an [`ErrorResponse`] carrying
//! the HTTP status of its [`ErrorCode`].

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{HealthResponse, InfoResponse};
use common::{BatchResponse, ErrorCode, ErrorResponse, FieldMap, Operation};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::state::AppState;
use crate::engine::{BatchMode, Direction, FailurePolicy, KeyScope, LeafError};
use crate::error::AeadError;
use crate::keyset;
use crate::resolver::resolve;
use crate::store::{ConfigValue, WriteMode, WriteOutcome};

fn status_of(code: ErrorCode) -> StatusCode {
    StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for AeadError {
    fn into_response(self) -> Response {
        let code = self.code();
        (status_of(code), Json(self.to_response())).into_response()
    }
}

impl IntoResponse for LeafError {
    fn into_response(self) -> Response {
        let code = self.error.code();
        let body = self.error.to_response().with_field(self.path);
        (status_of(code), Json(body)).into_response()
    }
}

type BatchResult = Result<Json<BatchResponse>, AeadError>;

fn record(resp: &mut BatchResponse, field: &str, outcome: Result<String, AeadError>) {
    match outcome {
        Ok(text) => {
            resp.data.insert(field.to_owned(), Value::String(text));
        }
        Err(e) => {
            resp.errors.insert(field.to_owned(), e.to_response().with_field(field));
        }
    }
}

/// `GET /v1/info`
pub async fn read_info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: state.service_name.as_str().to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

/// `GET /v1/config`: every entry, keysets masked.
pub async fn read_config(State(state): State<AppState>) -> BatchResult {
    let data = state.store.read_all_masked().await?;
    Ok(Json(BatchResponse {
        data,
        ..Default::default()
    }))
}

/// `POST /v1/config` and `/v1/config-overwrite`.
///
/// String values are stored verbatim; any other JSON value is stored as its
/// compact text.
pub async fn write_config(state: AppState, mode: WriteMode, body: FieldMap) -> BatchResult {
    let mut resp = BatchResponse::default();
    for (name, value) in &body {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let outcome = match state.store.write(name, text.clone(), mode).await {
            Ok(WriteOutcome::Written) => match keyset::mask_text(&text) {
                Some(masked) => masked.map_err(AeadError::from),
                None => Ok(text),
            },
            Ok(WriteOutcome::Exists) => Ok(format!("{name} exists")),
            Err(e) => Err(e),
        };
        record(&mut resp, name, outcome);
    }
    Ok(Json(resp))
}

/// `POST /v1/config-delete`
pub async fn delete_config(State(state): State<AppState>, Json(body): Json<FieldMap>) -> BatchResult {
    let mut resp = BatchResponse::default();
    for name in body.keys() {
        let outcome = state.store.delete(name).await.map(|()| "deleted".to_owned());
        record(&mut resp, name, outcome);
    }
    Ok(Json(resp))
}

/// `GET /v1/keytypes`: algorithm family of every stored keyset.
pub async fn read_keytypes(State(state): State<AppState>) -> BatchResult {
    let mut resp = BatchResponse::default();
    for name in state.store.names().await? {
        match state.store.get(&name).await {
            Ok(Some(ConfigValue::Keyset(ks))) => {
                record(&mut resp, &name, Ok(ks.algorithm().label().to_owned()));
            }
            Ok(_) => {}
            Err(e) => record(&mut resp, &name, Err(e)),
        }
    }
    Ok(Json(resp))
}

/// Any key lifecycle verb.
pub async fn lifecycle(state: AppState, op: Operation, body: FieldMap) -> BatchResult {
    Ok(Json(state.keys.apply_batch(op, &body).await?))
}

/// Query parameters accepted by the crypto verbs.
#[derive(Debug, Default, Deserialize)]
pub struct BatchParams {
    pub policy: Option<FailurePolicy>,
    pub scope: Option<KeyScope>,
}

/// `POST /v1/encrypt`, `/v1/decrypt`, `/v1/encrypt-col`, `/v1/decrypt-col`.
pub async fn crypto(
    state: AppState,
    direction: Direction,
    mode: BatchMode,
    params: BatchParams,
    body: FieldMap,
) -> Result<Json<BatchResponse>, LeafError> {
    let scope = params.scope.unwrap_or_else(|| mode.default_scope());
    let policy = params.policy.unwrap_or(state.default_policy);
    let resp = match direction {
        Direction::Encrypt => state.engine.encrypt(&body, scope, policy).await?,
        Direction::Decrypt => state.engine.decrypt(&body, scope, policy).await?,
    };
    Ok(Json(resp))
}

/// `POST /v1/reveal-key`: unmasked keysets, only with the capability.
pub async fn reveal_key(State(state): State<AppState>, Json(body): Json<FieldMap>) -> BatchResult {
    let Some(cap) = state.reveal.as_deref() else {
        warn!(fields = body.len(), "reveal-key refused: capability not enabled");
        return Err(AeadError::Forbidden("reveal-key is not enabled".into()));
    };
    let mut resp = BatchResponse::default();
    for field in body.keys() {
        let outcome = match resolve(field, &state.store).await {
            Ok(binding) => match state.store.reveal(cap, &binding.physical).await {
                Ok(Some(text)) => Ok(text),
                Ok(None) => Err(AeadError::KeyNotFound(binding.physical)),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        if outcome.is_ok() {
            warn!(field = %field, "unmasked keyset revealed");
        }
        record(&mut resp, field, outcome);
    }
    Ok(Json(resp))
}

/// `GET /health`: `200 OK` when the store answers within its deadline,
/// `503 Service Unavailable` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let store_reachable = state.store.ping().await;
    let (status_code, status_str) = if store_reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = HealthResponse {
        status: status_str.into(),
        store_reachable,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new(ErrorCode::NotFound, "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
