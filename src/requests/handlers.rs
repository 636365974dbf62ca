use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::extractors::{CurrentUser, MaybeUser};
use crate::error::ApiError;
use crate::requests::dto::{
    CreateRequestBody, ListQuery, ListResponse, MessageResponse, OwnRequestsResponse,
    RequestEnvelope, RequestResponse, UpdateRequestBody,
};
use crate::requests::services;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list_requests).post(create_request))
        .route("/requests/my", get(my_requests))
        .route(
            "/requests/:id",
            get(get_request).put(update_request).delete(withdraw_request),
        )
        .route("/requests/:id/fulfill", put(fulfill_request))
}

#[instrument(skip(state, _principal))]
async fn list_requests(
    State(state): State<AppState>,
    MaybeUser(_principal): MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let response = services::list_requests(&state, query).await?;
    Ok(Json(response))
}

#[instrument(skip(state, user))]
async fn my_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<OwnRequestsResponse>, ApiError> {
    let response = services::list_own(&state, &user).await?;
    Ok(Json(response))
}

#[instrument(skip(state, user, payload))]
async fn create_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<RequestEnvelope>), ApiError> {
    let request = services::create_request(&state, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RequestEnvelope {
            message: "Blood request created successfully",
            request,
        }),
    ))
}

#[instrument(skip(state, _principal))]
async fn get_request(
    State(state): State<AppState>,
    MaybeUser(_principal): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestResponse>, ApiError> {
    let request = services::get_request(&state, id).await?;
    Ok(Json(request))
}

#[instrument(skip(state, user, payload))]
async fn update_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequestBody>,
) -> Result<Json<RequestEnvelope>, ApiError> {
    let request = services::update_request(&state, &user, id, payload).await?;
    Ok(Json(RequestEnvelope {
        message: "Blood request updated successfully",
        request,
    }))
}

#[instrument(skip(state, user))]
async fn withdraw_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::withdraw_request(&state, &user, id).await?;
    Ok(Json(MessageResponse {
        message: "Blood request deleted successfully",
    }))
}

#[instrument(skip(state, user))]
async fn fulfill_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestEnvelope>, ApiError> {
    let request = services::fulfill_request(&state, &user, id).await?;
    Ok(Json(RequestEnvelope {
        message: "Blood request marked as fulfilled successfully",
        request,
    }))
}
