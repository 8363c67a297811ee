use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ProductPatchRequest, ProductRequest, SearchQuery, SEARCH_LIMIT},
    repo_types::Product,
    services,
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::{AppError, AppJson, AppPath, AppQuery, AppResult},
    pagination::{Page, Pagination},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/search", get(search_products))
        .route("/products/:id", get(get_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/products/add", post(add_product))
        .route("/products/update/:id", put(replace_product))
        .route("/products/updatepartially/:id", patch(patch_product))
        .route("/products/delete/:id", delete(delete_product))
}

#[instrument(skip(state, _auth))]
pub async fn list_products(
    State(state): State<AppState>,
    _auth: AuthUser,
    AppQuery(p): AppQuery<Pagination>,
) -> AppResult<Json<Page<Product>>> {
    let (total_count, items) = state.store.list_products(p.limit(), p.offset()).await?;
    Ok(Json(Page { total_count, items }))
}

#[instrument(skip(state, _auth))]
pub async fn search_products(
    State(state): State<AppState>,
    _auth: AuthUser,
    AppQuery(q): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let prefix = q.barcode.trim();
    if prefix.is_empty() {
        return Err(AppError::BadRequest("barcode query is required".into()));
    }
    let items = state
        .store
        .search_products_by_barcode(prefix, SEARCH_LIMIT)
        .await?;
    Ok(Json(items))
}

#[instrument(skip(state, _auth))]
pub async fn get_product(
    State(state): State<AppState>,
    _auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Product>> {
    Ok(Json(services::get_product(state.store.as_ref(), id).await?))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user_id))]
pub async fn add_product(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<ProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    payload.validate()?;
    let product = services::add_product(state.store.as_ref(), auth.user_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user_id))]
pub async fn replace_product(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ProductRequest>,
) -> AppResult<Json<Product>> {
    payload.validate()?;
    let product =
        services::replace_product(state.store.as_ref(), auth.user_id, id, payload.into()).await?;
    Ok(Json(product))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user_id))]
pub async fn patch_product(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ProductPatchRequest>,
) -> AppResult<Json<Product>> {
    if payload.is_empty() {
        return Err(AppError::BadRequest("no fields to update".into()));
    }
    payload.validate()?;
    let product =
        services::patch_product(state.store.as_ref(), auth.user_id, id, payload.into()).await?;
    Ok(Json(product))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_product(state.store.as_ref(), auth.user_id, id).await?;
    Ok(Json(MessageResponse::new("Product deleted successfully")))
}
