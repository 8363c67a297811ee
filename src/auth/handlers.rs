use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dto::{AuthResponse, LoginRequest, MessageResponse, PublicUser, SignupRequest, VerifyEmailRequest},
    extractors::AuthUser,
    jwt::JwtKeys,
    services,
};
use crate::{
    error::{AppJson, AppResult},
    reset::services::ResetCodes,
    state::AppState,
    validation::normalize_email,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/verifyemail", post(verify_email))
}

/// Open to anyone. A valid token is only consulted when an admin account
/// is requested.
#[instrument(skip(state, caller, payload))]
pub async fn signup(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let codes = ResetCodes::from_state(&state);
    let user = services::signup(
        state.store.as_ref(),
        &codes,
        &state.passwords,
        payload,
        caller.map(|c| c.role),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let (user, pair) = services::login(state.store.as_ref(), &keys, &state.passwords, payload).await?;
    Ok(Json(AuthResponse {
        token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    services::logout(state.store.as_ref(), &auth.token).await?;
    info!(user_id = %auth.user_id, email = %auth.email, "user logged out");
    Ok(Json(MessageResponse::new("Successfully logged out")))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyEmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = normalize_email(&payload.email);
    ResetCodes::from_state(&state)
        .verify_email(&email, payload.code.trim(), OffsetDateTime::now_utc())
        .await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}
