use axum::{extract::State, routing::post, Json, Router};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    dto::{ChangePasswordRequest, ResetConfirmRequest, ResetRequest},
    services::ResetCodes,
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::{AppError, AppJson, AppResult},
    mailer::CodePurpose,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/passwordreset/request", post(request_reset))
        .route("/passwordreset/confirm", post(confirm_reset))
        .route("/passwordreset/changepassword", post(change_password))
}

/// Always answers the same way so the endpoint does not reveal which emails exist.
#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<ResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    payload.normalize();
    payload.validate()?;

    if state.store.find_user_by_email(&payload.email).await?.is_some() {
        ResetCodes::from_state(&state)
            .generate(&payload.email, CodePurpose::PasswordReset, OffsetDateTime::now_utc())
            .await?;
    } else {
        warn!(email = %payload.email, "password reset requested for unknown email");
    }

    Ok(Json(MessageResponse::new(
        "If the account exists, a reset code has been sent",
    )))
}

#[instrument(skip(state, payload))]
pub async fn confirm_reset(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<ResetConfirmRequest>,
) -> AppResult<Json<MessageResponse>> {
    payload.normalize();
    payload.validate()?;

    ResetCodes::from_state(&state)
        .consume(
            &payload.email,
            &payload.code,
            &payload.new_password,
            OffsetDateTime::now_utc(),
        )
        .await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user_id))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    payload.validate()?;

    let user = state
        .store
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !state.passwords.verify(&payload.old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "change password with wrong old password");
        return Err(AppError::Unauthorized("Old password is incorrect".into()));
    }

    let hash = state.passwords.hash(&payload.new_password)?;
    state.store.update_user_password(&user.email, &hash).await?;
    info!(user_id = %user.id, "password changed");

    Ok(Json(MessageResponse::new("Password has been changed")))
}
