//! Axum router construction.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use common::{FieldMap, Operation};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{self, BatchParams};
use super::state::AppState;
use crate::engine::{BatchMode, Direction};
use crate::store::WriteMode;

/// Per-request timeout applied to all routes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const LIFECYCLE: [Operation; 10] = [
    Operation::CreateAeadKey,
    Operation::CreateAeadKeyOverwrite,
    Operation::CreateDaeadKey,
    Operation::CreateDaeadKeyOverwrite,
    Operation::ImportKey,
    Operation::Rotate,
    Operation::UpdateKeyStatus,
    Operation::UpdateKeyMaterial,
    Operation::UpdateKeyId,
    Operation::UpdatePrimaryKeyId,
];

fn write_config(mode: WriteMode) -> MethodRouter<AppState> {
    post(move |State(state): State<AppState>, Json(body): Json<FieldMap>| {
        handlers::write_config(state, mode, body)
    })
}

fn lifecycle(op: Operation) -> MethodRouter<AppState> {
    post(move |State(state): State<AppState>, Json(body): Json<FieldMap>| {
        handlers::lifecycle(state, op, body)
    })
}

fn crypto(direction: Direction, mode: BatchMode) -> MethodRouter<AppState> {
    post(
        move |State(state): State<AppState>, Query(params): Query<BatchParams>, Json(body): Json<FieldMap>| {
            handlers::crypto(state, direction, mode, params, body)
        },
    )
}

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    let mut router = Router::new()
        .route(Operation::ReadInfo.path(), get(handlers::read_info))
        .route(
            Operation::ReadConfig.path(),
            get(handlers::read_config).merge(write_config(WriteMode::CreateIfAbsent)),
        )
        .route(Operation::WriteConfigOverwrite.path(), write_config(WriteMode::Overwrite))
        .route(Operation::DeleteConfig.path(), post(handlers::delete_config))
        .route(Operation::ReadKeyTypes.path(), get(handlers::read_keytypes))
        .route(Operation::Encrypt.path(), crypto(Direction::Encrypt, BatchMode::Row))
        .route(Operation::Decrypt.path(), crypto(Direction::Decrypt, BatchMode::Row))
        .route(Operation::EncryptCol.path(), crypto(Direction::Encrypt, BatchMode::Column))
        .route(Operation::DecryptCol.path(), crypto(Direction::Decrypt, BatchMode::Column))
        .route(Operation::RevealKey.path(), post(handlers::reveal_key))
        .route(Operation::Health.path(), get(handlers::health));
    for op in LIFECYCLE {
        router = router.route(op.path(), lifecycle(op));
    }
    router
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}
