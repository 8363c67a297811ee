use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductPatch};
use crate::db::{PgStore, StoreError};

const PRODUCT_COLUMNS: &str =
    "id, barcode, name, description, price, stock, created_at, updated_at";
const DUPLICATE_BARCODE: &str = "Product already exists";

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn barcode_exists(&self, barcode: &str) -> Result<bool, StoreError>;
    async fn insert_product(&self, new: &NewProduct) -> Result<Product, StoreError>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    /// Total count plus one page, oldest first.
    async fn list_products(&self, limit: i64, offset: i64) -> Result<(i64, Vec<Product>), StoreError>;
    async fn search_products_by_barcode(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<Product>, StoreError>;
    /// `None` when no product has that id.
    async fn replace_product(&self, id: Uuid, new: &NewProduct) -> Result<Option<Product>, StoreError>;
    async fn patch_product(&self, id: Uuid, patch: &ProductPatch) -> Result<Option<Product>, StoreError>;
    /// Returns the deleted row.
    async fn delete_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
}

/// Escapes LIKE metacharacters so the prefix matches literally.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl ProductRepo for PgStore {
    async fn barcode_exists(&self, barcode: &str) -> Result<bool, StoreError> {
        self.timed(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM products WHERE barcode = $1)")
                .bind(barcode)
                .fetch_one(self.pool()),
        )
        .await
    }

    async fn insert_product(&self, new: &NewProduct) -> Result<Product, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO products (barcode, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        self.timed(
            sqlx::query_as::<_, Product>(&sql)
                .bind(&new.barcode)
                .bind(&new.name)
                .bind(&new.description)
                .bind(new.price)
                .bind(new.stock)
                .fetch_one(self.pool()),
        )
        .await
        .map_err(|e| e.unique_as_conflict(DUPLICATE_BARCODE))
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        self.timed(
            sqlx::query_as::<_, Product>(&sql)
                .bind(id)
                .fetch_optional(self.pool()),
        )
        .await
    }

    async fn list_products(&self, limit: i64, offset: i64) -> Result<(i64, Vec<Product>), StoreError> {
        let total: i64 = self
            .timed(sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(self.pool()))
            .await?;
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        let items = self
            .timed(
                sqlx::query_as::<_, Product>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool()),
            )
            .await?;
        Ok((total, items))
    }

    async fn search_products_by_barcode(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
              FROM products
             WHERE barcode LIKE $1 ESCAPE '\'
             ORDER BY barcode ASC
             LIMIT $2
            "#
        );
        self.timed(
            sqlx::query_as::<_, Product>(&sql)
                .bind(like_prefix(prefix))
                .bind(limit)
                .fetch_all(self.pool()),
        )
        .await
    }

    async fn replace_product(&self, id: Uuid, new: &NewProduct) -> Result<Option<Product>, StoreError> {
        let sql = format!(
            r#"
            UPDATE products
               SET barcode = $2, name = $3, description = $4, price = $5, stock = $6,
                   updated_at = now()
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        self.timed(
            sqlx::query_as::<_, Product>(&sql)
                .bind(id)
                .bind(&new.barcode)
                .bind(&new.name)
                .bind(&new.description)
                .bind(new.price)
                .bind(new.stock)
                .fetch_optional(self.pool()),
        )
        .await
        .map_err(|e| e.unique_as_conflict(DUPLICATE_BARCODE))
    }

    async fn patch_product(&self, id: Uuid, patch: &ProductPatch) -> Result<Option<Product>, StoreError> {
        let sql = format!(
            r#"
            UPDATE products
               SET barcode     = COALESCE($2, barcode),
                   name        = COALESCE($3, name),
                   description = COALESCE($4, description),
                   price       = COALESCE($5, price),
                   stock       = COALESCE($6, stock),
                   updated_at  = now()
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        self.timed(
            sqlx::query_as::<_, Product>(&sql)
                .bind(id)
                .bind(patch.barcode.as_deref())
                .bind(patch.name.as_deref())
                .bind(patch.description.as_deref())
                .bind(patch.price)
                .bind(patch.stock)
                .fetch_optional(self.pool()),
        )
        .await
        .map_err(|e| e.unique_as_conflict(DUPLICATE_BARCODE))
    }

    async fn delete_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let sql = format!("DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}");
        self.timed(
            sqlx::query_as::<_, Product>(&sql)
                .bind(id)
                .fetch_optional(self.pool()),
        )
        .await
    }
}
