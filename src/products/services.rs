use tracing::info;
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductPatch};
use crate::{
    db::Store,
    error::{AppError, AppResult},
    ledger::{self, repo::OperationKind},
};

fn not_found() -> AppError {
    AppError::NotFound("Product not found".into())
}

/// Ledger failures are logged by `ledger::record` and otherwise ignored;
/// the product change already happened.
async fn append_ledger(
    store: &dyn Store,
    user_id: Uuid,
    product: &Product,
    kind: OperationKind,
) {
    let _ = ledger::record(store, user_id, product.id, kind, product.stock).await;
}

pub async fn add_product(store: &dyn Store, user_id: Uuid, new: NewProduct) -> AppResult<Product> {
    if store.barcode_exists(&new.barcode).await? {
        return Err(AppError::Conflict("Product already exists".into()));
    }
    let product = store.insert_product(&new).await?;
    info!(product_id = %product.id, barcode = %product.barcode, "product added");
    append_ledger(store, user_id, &product, OperationKind::Add).await;
    Ok(product)
}

pub async fn replace_product(
    store: &dyn Store,
    user_id: Uuid,
    id: Uuid,
    new: NewProduct,
) -> AppResult<Product> {
    let product = store.replace_product(id, &new).await?.ok_or_else(not_found)?;
    info!(product_id = %product.id, "product replaced");
    append_ledger(store, user_id, &product, OperationKind::Update).await;
    Ok(product)
}

pub async fn patch_product(
    store: &dyn Store,
    user_id: Uuid,
    id: Uuid,
    patch: ProductPatch,
) -> AppResult<Product> {
    let product = store.patch_product(id, &patch).await?.ok_or_else(not_found)?;
    info!(product_id = %product.id, "product patched");
    append_ledger(store, user_id, &product, OperationKind::Update).await;
    Ok(product)
}

pub async fn delete_product(store: &dyn Store, user_id: Uuid, id: Uuid) -> AppResult<Product> {
    let product = store.delete_product(id).await?.ok_or_else(not_found)?;
    info!(product_id = %product.id, "product deleted");
    append_ledger(store, user_id, &product, OperationKind::Delete).await;
    Ok(product)
}

pub async fn get_product(store: &dyn Store, id: Uuid) -> AppResult<Product> {
    store.find_product(id).await?.ok_or_else(not_found)
}
