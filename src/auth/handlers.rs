use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, LogoutRequest, MessageResponse,
            PasswordResetConfirmRequest, PasswordResetRequest, PublicUser, RefreshRequest,
            RegisterRequest, RegisterResponse, ResendVerificationRequest, UpdateProfileRequest,
            VerifyTokenRequest,
        },
        jwt::{JwtKeys, AuthUser},
        password::{hash_password, validate_new_password, verify_password},
        repo::{self, User},
        tokens::{self, TokenPurpose},
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/verify", post(verify_token))
        .route("/auth/logout", post(logout))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/profile",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/users/profile/change-password", patch(change_password))
        .route("/users/password-reset", post(password_reset_request))
        .route(
            "/users/password-reset-confirm/:uid/:token",
            post(password_reset_confirm),
        )
        .route("/users/verify-email/:uid/:token", get(verify_email))
        .route("/users/resend-verification", post(resend_verification))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Sign an access/refresh pair and record the refresh jti in the ledger.
async fn issue_token_pair(
    state: &AppState,
    keys: &JwtKeys,
    user_id: Uuid,
) -> Result<(String, String), ApiError> {
    let access_token = keys.sign_access(user_id)?;
    let signed = keys.sign_refresh(user_id)?;
    let expires_at = OffsetDateTime::from_unix_timestamp(signed.claims.exp as i64)
        .map_err(|e| ApiError::Internal(e.into()))?;
    repo::record_refresh(&state.db, signed.claims.jti, user_id, expires_at).await?;
    Ok((access_token, signed.token))
}

/// Create a verification token for `user` and send the link. Shared by
/// register and resend-verification; send failures propagate to the caller.
async fn send_verification_link(state: &AppState, user: &User) -> Result<(), ApiError> {
    let token = tokens::generate_token();
    let expires_at = OffsetDateTime::now_utc()
        + TimeDuration::hours(state.config.email_verification_ttl_hours);
    repo::create_account_token(
        &state.db,
        user.id,
        TokenPurpose::VerifyEmail,
        &tokens::token_digest(&token),
        expires_at,
    )
    .await?;

    let link = format!(
        "{}/api/v1/users/verify-email/{}/{}",
        state.config.base_url,
        tokens::encode_uid(user.id),
        token
    );
    state
        .mailer
        .send_verification_email(
            &user.email,
            &user.name,
            &link,
            state.config.email_verification_ttl_hours,
        )
        .await?;
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation(
            "email",
            "Enter a valid email address.",
        ));
    }
    let name = payload.name.trim();
    if name.len() < 2 || name.len() > 30 {
        return Err(ApiError::validation(
            "name",
            "Name must be between 2 and 30 characters long.",
        ));
    }
    validate_new_password(&payload.password, &payload.password2, "password")?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict(
            "A user with this email already exists.".into(),
        ));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, name, &hash).await?;

    send_verification_link(&state, &user).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully. Please check your email to verify your account."
                .into(),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    if !user.is_verified {
        warn!(user_id = %user.id, "login before email verification");
        return Err(ApiError::Unauthorized("Email not verified".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = issue_token_pair(&state, &keys, user.id).await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token.".into()))?;

    if repo::is_refresh_revoked(&state.db, claims.jti).await? {
        warn!(user_id = %claims.sub, jti = %claims.jti, "revoked refresh token replayed");
        return Err(ApiError::Unauthorized(
            "Invalid or expired refresh token.".into(),
        ));
    }

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    // Rotation: the presented token is spent regardless of what happens next.
    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
        .map_err(|e| ApiError::Internal(e.into()))?;
    repo::revoke_refresh(&state.db, claims.jti, claims.sub, expires_at).await?;

    let (access_token, refresh_token) = issue_token_pair(&state, &keys, user.id).await?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_token(
    State(state): State<AppState>,
    Json(payload): Json<VerifyTokenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    keys.verify(&payload.token)
        .map_err(|_| ApiError::Unauthorized("Token is invalid or expired".into()))?;
    Ok(Json(json!({})))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<LogoutRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh)
        .map_err(|_| ApiError::BadRequest("Invalid or expired refresh token.".into()))?;

    if repo::is_refresh_revoked(&state.db, claims.jti).await? {
        return Err(ApiError::BadRequest(
            "Invalid or expired refresh token.".into(),
        ));
    }

    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
        .map_err(|e| ApiError::Internal(e.into()))?;
    repo::revoke_refresh(&state.db, claims.jti, claims.sub, expires_at).await?;

    info!(user_id = %user_id, "user logged out");
    Ok((
        StatusCode::RESET_CONTENT,
        Json(MessageResponse::new("Successfully logged out.")),
    ))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let name = payload.name.trim();
    if name.len() < 2 || name.len() > 30 {
        return Err(ApiError::validation(
            "name",
            "Name must be between 2 and 30 characters long.",
        ));
    }
    let user = User::update_name(&state.db, user_id, name).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, ApiError> {
    User::delete(&state.db, user_id).await?;
    info!(user_id = %user_id, "user account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    if !verify_password(&payload.old_password, &user.password_hash)? {
        return Err(ApiError::validation(
            "old_password",
            "Old password is incorrect.",
        ));
    }
    if payload.new_password == payload.old_password {
        return Err(ApiError::validation(
            "new_password",
            "New password must be different from old password.",
        ));
    }
    validate_new_password(&payload.new_password, &payload.new_password2, "new_password")?;

    let hash = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user_id, &hash).await?;
    repo::revoke_all_refresh_for_user(&state.db, user_id).await?;

    info!(user_id = %user_id, "password changed, sessions revoked");
    Ok(Json(MessageResponse::new(
        "Password updated successfully. Please login again.",
    )))
}

#[instrument(skip(state, payload))]
pub async fn password_reset_request(
    State(state): State<AppState>,
    Json(mut payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::validation(
            "email",
            "Enter a valid email address.",
        ));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            ApiError::validation("email", "No user is associated with this email address.")
        })?;

    let token = tokens::generate_token();
    let expires_at =
        OffsetDateTime::now_utc() + TimeDuration::hours(state.config.password_reset_ttl_hours);
    repo::create_account_token(
        &state.db,
        user.id,
        TokenPurpose::PasswordReset,
        &tokens::token_digest(&token),
        expires_at,
    )
    .await?;

    let link = format!(
        "{}/api/v1/users/password-reset-confirm/{}/{}",
        state.config.base_url,
        tokens::encode_uid(user.id),
        token
    );
    state
        .mailer
        .send_password_reset_email(
            &user.email,
            &user.name,
            &link,
            state.config.password_reset_ttl_hours,
        )
        .await?;

    info!(user_id = %user.id, "password reset email sent");
    Ok(Json(MessageResponse::new(
        "Password reset email sent. Please check your inbox.",
    )))
}

#[instrument(skip(state, payload))]
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = tokens::decode_uid(&uid)
        .ok_or_else(|| ApiError::BadRequest("Invalid password reset link.".into()))?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid password reset link.".into()))?;

    validate_new_password(&payload.new_password, &payload.new_password2, "new_password")?;

    let consumed = repo::consume_account_token(
        &state.db,
        user.id,
        TokenPurpose::PasswordReset,
        &tokens::token_digest(&token),
    )
    .await?;
    if !consumed {
        // Expired, unknown and replayed tokens share one message.
        return Err(ApiError::BadRequest("Invalid or expired token.".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user.id, &hash).await?;
    repo::revoke_all_refresh_for_user(&state.db, user.id).await?;

    info!(user_id = %user.id, "password reset completed");
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully.",
    )))
}

#[instrument(skip(state))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = tokens::decode_uid(&uid)
        .ok_or_else(|| ApiError::BadRequest("Invalid verification link.".into()))?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid verification link.".into()))?;

    if user.is_verified {
        return Ok(Json(MessageResponse::new("Email is already verified.")));
    }

    let consumed = repo::consume_account_token(
        &state.db,
        user.id,
        TokenPurpose::VerifyEmail,
        &tokens::token_digest(&token),
    )
    .await?;
    if !consumed {
        return Err(ApiError::BadRequest("Invalid or expired token.".into()));
    }

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse::new("Email verified successfully.")))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(mut payload): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::validation(
            "email",
            "Enter a valid email address.",
        ));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::validation("email", "No user with this email exists."))?;

    if user.is_verified {
        return Ok(Json(MessageResponse::new("Email is already verified.")));
    }

    send_verification_link(&state, &user).await?;
    Ok(Json(MessageResponse::new(
        "Verification email resent. Please check your inbox.",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn email_regex_rejects_malformed_addresses() {
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@nodot"));
    }

    #[test]
    fn public_user_serialization_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            name: "Test".into(),
            password_hash: "secret-hash".into(),
            is_verified: true,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let public: PublicUser = user.into();
        let json = serde_json::to_string(&public).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("secret-hash"));
    }
}
