use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{PgStore, StoreError};

/// Stock-affecting operation recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_operation", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Add,
    Update,
    Delete,
}

/// One immutable ledger row. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub kind: OperationKind,
    pub amount: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub kind: OperationKind,
    pub amount: i64,
}

/// Append-only: the application never reads the ledger back.
#[async_trait]
pub trait LedgerRepo: Send + Sync {
    async fn append_transaction(&self, entry: &NewTransaction) -> Result<Transaction, StoreError>;
}

#[async_trait]
impl LedgerRepo for PgStore {
    async fn append_transaction(&self, entry: &NewTransaction) -> Result<Transaction, StoreError> {
        self.timed(
            sqlx::query_as::<_, Transaction>(
                r#"
                INSERT INTO transactions (user_id, product_id, kind, amount)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_id, product_id, kind, amount, processed_at
                "#,
            )
            .bind(entry.user_id)
            .bind(entry.product_id)
            .bind(entry.kind)
            .bind(entry.amount)
            .fetch_one(self.pool()),
        )
        .await
    }
}
