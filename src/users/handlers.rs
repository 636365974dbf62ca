use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::dto::PublicUser;
use crate::auth::extractors::{AdminUser, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::UpdateProfileRequest;
use crate::users::services;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).put(update_me))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/deactivate", put(deactivate_user))
}

#[instrument(skip(user))]
async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip(state, user, payload))]
async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let updated = services::update_profile(&state, &user, payload).await?;
    Ok(Json(updated))
}

#[instrument(skip(state, _admin))]
async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = services::list_users(&state).await?;
    Ok(Json(users))
}

#[instrument(skip(state, _admin))]
async fn deactivate_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = services::deactivate_user(&state, id).await?;
    Ok(Json(user))
}
