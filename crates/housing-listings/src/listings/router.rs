use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::auth::{Caller, TokenAuthority};
use super::cache::CacheTransport;
use super::domain::{
    FlatId, FlatStatus, HouseId, ModeratorId, NewFlat, NewHouse, Role, StatusChange,
};
use super::service::{ListingError, ListingService};
use super::store::ListingStore;
use super::transition::ModerationOutcome;

/// Shared state behind the listing routes.
pub struct ListingState<S, T> {
    pub service: Arc<ListingService<S, T>>,
    pub tokens: Arc<TokenAuthority>,
}

impl<S, T> Clone for ListingState<S, T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

impl<S, T> FromRef<ListingState<S, T>> for Arc<TokenAuthority> {
    fn from_ref(state: &ListingState<S, T>) -> Self {
        Arc::clone(&state.tokens)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginQuery {
    user_type: String,
    #[serde(default)]
    moderator_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateFlatRequest {
    id: FlatId,
    status: FlatStatus,
}

/// Router builder exposing the listing endpoints.
pub fn listing_router<S, T>(
    service: Arc<ListingService<S, T>>,
    tokens: Arc<TokenAuthority>,
) -> Router
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    Router::new()
        .route("/dummyLogin", get(dummy_login_handler::<S, T>))
        .route("/house/:id", get(house_flats_handler::<S, T>))
        .route("/house/create", post(create_house_handler::<S, T>))
        .route("/flat/create", post(create_flat_handler::<S, T>))
        .route("/flat/update", post(update_flat_handler::<S, T>))
        .with_state(ListingState { service, tokens })
}

pub(crate) async fn dummy_login_handler<S, T>(
    State(state): State<ListingState<S, T>>,
    Query(query): Query<LoginQuery>,
) -> Response
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    let role = match query.user_type.parse::<Role>() {
        Ok(role) => role,
        Err(err) => return bad_request(err.to_string()),
    };

    match state.tokens.issue(role, query.moderator_id.map(ModeratorId)) {
        Ok((token, _)) => (StatusCode::OK, Json(json!({ "token": token }))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn house_flats_handler<S, T>(
    State(state): State<ListingState<S, T>>,
    caller: Caller,
    Path(house_id): Path<i64>,
) -> Response
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    match state.service.list_flats(HouseId(house_id), caller.role).await {
        Ok(flats) => (StatusCode::OK, Json(flats)).into_response(),
        Err(err) => listing_error_response(err),
    }
}

pub(crate) async fn create_house_handler<S, T>(
    State(state): State<ListingState<S, T>>,
    caller: Caller,
    payload: Result<Json<NewHouse>, JsonRejection>,
) -> Response
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    if let Err(err) = caller.moderator() {
        return err.into_response();
    }
    let Json(house) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match state.service.create_house(house).await {
        Ok(house) => (StatusCode::OK, Json(house)).into_response(),
        Err(err) => listing_error_response(err),
    }
}

pub(crate) async fn create_flat_handler<S, T>(
    State(state): State<ListingState<S, T>>,
    _caller: Caller,
    payload: Result<Json<NewFlat>, JsonRejection>,
) -> Response
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    let Json(flat) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match state.service.create_flat(flat).await {
        Ok(flat) => (StatusCode::OK, Json(flat)).into_response(),
        Err(err) => listing_error_response(err),
    }
}

pub(crate) async fn update_flat_handler<S, T>(
    State(state): State<ListingState<S, T>>,
    caller: Caller,
    payload: Result<Json<UpdateFlatRequest>, JsonRejection>,
) -> Response
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    let moderator_id = match caller.moderator() {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let change = StatusChange {
        flat_id: request.id,
        status: request.status,
        moderator_id,
    };

    match state.service.update_flat(change).await {
        Ok(ModerationOutcome::Applied(receipt)) => {
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Ok(ModerationOutcome::Rejected(rejection)) => {
            let payload = json!({
                "error": "flat is already being moderated by another moderator",
                "flat_id": rejection.flat_id,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(err) => listing_error_response(err),
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn listing_error_response(err: ListingError) -> Response {
    match err {
        ListingError::NotFound(_) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": err.to_string() }))).into_response()
        }
        ListingError::Validation(_) => bad_request(err.to_string()),
        ListingError::StoreUnavailable(_) => {
            error!(error = %err, "listing request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::RETRY_AFTER, "3")],
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
