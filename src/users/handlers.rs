use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::PublicUser,
        extractors::{AuthUser, RequireAdmin},
        repo_types::Role,
    },
    error::{AppError, AppPath, AppQuery, AppResult},
    pagination::{Page, Pagination},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user_id))]
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppQuery(p): AppQuery<Pagination>,
) -> AppResult<Json<Page<PublicUser>>> {
    let (total_count, items) = state.store.list_users(p.limit(), p.offset()).await?;
    debug!(admin = %admin.email, total_count, returned = items.len(), "users listed");
    Ok(Json(Page { total_count, items }.map(PublicUser::from)))
}

/// Admins may read anyone; other users only themselves.
#[instrument(skip(state, auth), fields(caller = %auth.user_id))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<PublicUser>> {
    if auth.role != Role::Admin && auth.user_id != id {
        warn!(target_user = %id, "user lookup denied");
        return Err(AppError::Forbidden("unauthorized to access this resource".into()));
    }
    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}
