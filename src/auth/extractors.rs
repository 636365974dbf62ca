use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{debug, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::Role;

/// Required-auth guard: verifies the bearer token, loads the subject and
/// re-checks the active flag so a deactivated account's still-valid token
/// is rejected.
#[derive(Debug)]
pub struct CurrentUser(pub User);

/// Optional-auth guard: anonymous callers and callers with a bad token both
/// resolve to `None` instead of failing the request.
pub struct MaybeUser(pub Option<User>);

/// Admin-only guard: `CurrentUser` plus a role check.
#[derive(Debug)]
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}

async fn resolve_principal(parts: &Parts, state: &AppState) -> Result<User, ApiError> {
    let token = bearer_token(parts).ok_or(ApiError::TokenInvalid)?;
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|e| {
        warn!("token rejected");
        ApiError::from(e)
    })?;
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or(ApiError::TokenInvalid)?;
    if !user.is_active {
        warn!(user_id = %user.id, "token for deactivated account");
        return Err(ApiError::TokenInvalid);
    }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_principal(parts, state).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_principal(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => {
                debug!("anonymous caller");
                Ok(MaybeUser(None))
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_principal(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
