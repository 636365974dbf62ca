use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::NewUser;
use crate::error::{ApiError, FieldError};
use crate::state::AppState;
use crate::types::Role;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub async fn register(state: &AppState, payload: RegisterRequest) -> Result<PublicUser, ApiError> {
    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_lowercase();
    let role = payload.role.unwrap_or_default();

    let mut errors = Vec::new();
    if name.chars().count() < 2 || name.chars().count() > 50 {
        errors.push(FieldError::new("name", "Name must be 2-50 chars"));
    }
    if !is_valid_email(&email) {
        errors.push(FieldError::new("email", "Invalid email"));
    }
    if payload.password.chars().count() < 6 {
        errors.push(FieldError::new("password", "Password must be at least 6 chars"));
    }
    // Accounts self-select donor or patient; privileged roles are not
    // claimable at registration.
    if role == Role::Admin {
        errors.push(FieldError::new("role", "Role must be donor or patient"));
    }
    if !errors.is_empty() {
        warn!(email = %email, "registration validation failed");
        return Err(ApiError::validation(errors));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .users
        .insert(NewUser {
            name,
            email,
            password_hash,
            blood_type: payload.blood_type,
            phone: payload.phone,
            location: payload.location,
            role,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

pub async fn login(state: &AppState, payload: LoginRequest) -> Result<AuthResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();

    // Unknown email, deactivated account and wrong password all collapse
    // into the same error so responses cannot enumerate accounts.
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !user.is_active {
        warn!(user_id = %user.id, "login attempt on deactivated account");
        return Err(ApiError::InvalidCredentials);
    }
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_config(&state.config.jwt);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BloodType;

    fn register_body(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Alice".into(),
            email: email.into(),
            password: password.into(),
            blood_type: Some(BloodType::ONeg),
            phone: Some("9998887777".into()),
            location: Some("City Hospital".into()),
            role: Some(Role::Patient),
        }
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let state = AppState::in_memory();
        let user = register(&state, register_body("alice@x.com", "secret1"))
            .await
            .expect("register");
        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.role, Role::Patient);

        let auth = login(
            &state,
            LoginRequest {
                email: "alice@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .expect("login");
        assert!(!auth.token.is_empty());
        assert_eq!(auth.user.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let state = AppState::in_memory();
        register(&state, register_body("alice@x.com", "secret1"))
            .await
            .expect("first registration");
        let err = register(&state, register_body("ALICE@X.COM", "other-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEmail));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_identical() {
        let state = AppState::in_memory();
        register(&state, register_body("alice@x.com", "secret1"))
            .await
            .expect("register");

        let wrong_pass = login(
            &state,
            LoginRequest {
                email: "alice@x.com".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown = login(
            &state,
            LoginRequest {
                email: "nobody@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(wrong_pass, ApiError::InvalidCredentials));
        assert!(matches!(unknown, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn deactivated_account_cannot_login() {
        let state = AppState::in_memory();
        let user = register(&state, register_body("alice@x.com", "secret1"))
            .await
            .expect("register");
        state
            .users
            .set_active(user.id, false)
            .await
            .expect("store ok")
            .expect("user exists");
        let err = login(
            &state,
            LoginRequest {
                email: "alice@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn admin_self_registration_is_rejected() {
        let state = AppState::in_memory();
        let mut body = register_body("root@x.com", "secret1");
        body.role = Some(Role::Admin);
        let err = register(&state, body).await.unwrap_err();
        match err {
            ApiError::Validation(details) => {
                assert!(details.iter().any(|d| d.field == "role"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn short_password_and_bad_email_report_per_field() {
        let state = AppState::in_memory();
        let mut body = register_body("not-an-email", "abc");
        body.name = "A".into();
        let err = register(&state, body).await.unwrap_err();
        match err {
            ApiError::Validation(details) => {
                let fields: Vec<_> = details.iter().map(|d| d.field).collect();
                assert!(fields.contains(&"name"));
                assert!(fields.contains(&"email"));
                assert!(fields.contains(&"password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
