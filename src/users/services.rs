use tracing::info;
use uuid::Uuid;

use crate::auth::dto::PublicUser;
use crate::auth::repo::{ProfilePatch, User};
use crate::error::{ApiError, FieldError};
use crate::state::AppState;
use crate::users::dto::UpdateProfileRequest;

pub async fn update_profile(
    state: &AppState,
    user: &User,
    payload: UpdateProfileRequest,
) -> Result<PublicUser, ApiError> {
    let name = payload.name.map(|n| n.trim().to_string());
    if let Some(name) = &name {
        if name.chars().count() < 2 || name.chars().count() > 50 {
            return Err(ApiError::validation(vec![FieldError::new(
                "name",
                "Name must be 2-50 chars",
            )]));
        }
    }
    let patch = ProfilePatch {
        name,
        phone: payload.phone,
        location: payload.location,
    };
    let updated = state
        .users
        .update_profile(user.id, &patch)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    info!(user_id = %updated.id, "profile updated");
    Ok(updated.into())
}

pub async fn list_users(state: &AppState) -> Result<Vec<PublicUser>, ApiError> {
    let users = state.users.list().await?;
    Ok(users.into_iter().map(Into::into).collect())
}

pub async fn deactivate_user(state: &AppState, id: Uuid) -> Result<PublicUser, ApiError> {
    let user = state
        .users
        .set_active(id, false)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    info!(user_id = %user.id, "account deactivated");
    Ok(user.into())
}
