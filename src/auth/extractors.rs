use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys, repo_types::Role};
use crate::{error::AppError, state::AppState};

/// Header carrying the raw access token.
pub const TOKEN_HEADER: &str = "token";

/// Caller identity from a valid, non-blacklisted access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    /// The raw token string, needed for logout.
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized("No Authorization header provided".into()))?;

        if state.store.is_token_blacklisted(token).await? {
            warn!("blacklisted token presented");
            return Err(AppError::Unauthorized("Invalid token".into()));
        }

        let keys = JwtKeys::from_ref(state);
        let claims = keys.validate(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            AppError::Unauthorized("Invalid token".into())
        })?;

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            token: token.to_string(),
        })
    }
}

/// Requires the ADMIN role. Rejects with 403 otherwise.
pub struct RequireAdmin(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden("unauthorized to access this route".into()));
        }
        Ok(RequireAdmin(user))
    }
}
