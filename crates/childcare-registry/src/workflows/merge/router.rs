use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;

use crate::store::DocumentStore;

use super::directory::IdentityProvider;
use super::service::{
    AccountMergeService, CompleteMergeRequest, MergeError, MergeParentDataRequest,
    UnlinkPhoneRequest,
};

/// Header set by the fronting auth proxy after token validation.
pub const AUTH_UID_HEADER: &str = "x-auth-uid";

/// Router builder exposing the account-merge endpoints.
pub fn merge_router<S, P>(service: Arc<AccountMergeService<S, P>>) -> Router
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    Router::new()
        .route(
            "/api/v1/account/merge-parent-data",
            post(merge_parent_data_handler::<S, P>),
        )
        .route(
            "/api/v1/account/complete-merge",
            post(complete_merge_handler::<S, P>),
        )
        .route(
            "/api/v1/admin/unlink-phone",
            post(unlink_phone_handler::<S, P>),
        )
        .with_state(service)
}

pub(crate) async fn merge_parent_data_handler<S, P>(
    State(service): State<Arc<AccountMergeService<S, P>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<MergeParentDataRequest>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    let Some(caller) = caller_uid(&headers) else {
        return unauthorized();
    };
    match service.merge_parent_data(&caller, &request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn complete_merge_handler<S, P>(
    State(service): State<Arc<AccountMergeService<S, P>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CompleteMergeRequest>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    let Some(caller) = caller_uid(&headers) else {
        return unauthorized();
    };
    match service.complete_merge(&caller, &request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn unlink_phone_handler<S, P>(
    State(service): State<Arc<AccountMergeService<S, P>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<UnlinkPhoneRequest>,
) -> Response
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    let Some(caller) = caller_uid(&headers) else {
        return unauthorized();
    };
    match service.admin_unlink_phone(&caller, &request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

fn caller_uid(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTH_UID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .map(str::to_string)
}

fn unauthorized() -> Response {
    let payload = json!({ "error": "missing caller identity" });
    (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
}

fn error_response(error: MergeError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (error.status_code(), axum::Json(payload)).into_response()
}
