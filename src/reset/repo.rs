use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::{PgStore, StoreError},
    mailer::CodePurpose,
};

const CODE_COLUMNS: &str = "id, email, code, purpose, created_at, expires_at";

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ResetCode {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub purpose: CodePurpose,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl ResetCode {
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Codes are always addressed by (email, code, purpose), never by code alone.
#[async_trait]
pub trait ResetCodeRepo: Send + Sync {
    async fn insert_reset_code(&self, code: &ResetCode) -> Result<(), StoreError>;
    /// Most recent matching record, left in place.
    async fn find_reset_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<Option<ResetCode>, StoreError>;
    /// Deletes every matching record in one statement and returns the most
    /// recent. Of two concurrent callers only one gets `Some`.
    async fn take_reset_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<Option<ResetCode>, StoreError>;
}

#[async_trait]
impl ResetCodeRepo for PgStore {
    async fn insert_reset_code(&self, code: &ResetCode) -> Result<(), StoreError> {
        self.timed(
            sqlx::query(
                r#"
                INSERT INTO password_resets (id, email, code, purpose, created_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(code.id)
            .bind(&code.email)
            .bind(&code.code)
            .bind(code.purpose)
            .bind(code.created_at)
            .bind(code.expires_at)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn find_reset_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<Option<ResetCode>, StoreError> {
        let sql = format!(
            r#"
            SELECT {CODE_COLUMNS}
              FROM password_resets
             WHERE email = $1 AND code = $2 AND purpose = $3
             ORDER BY created_at DESC
             LIMIT 1
            "#
        );
        self.timed(
            sqlx::query_as::<_, ResetCode>(&sql)
                .bind(email)
                .bind(code)
                .bind(purpose)
                .fetch_optional(self.pool()),
        )
        .await
    }

    async fn take_reset_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<Option<ResetCode>, StoreError> {
        let sql = format!(
            r#"
            DELETE FROM password_resets
             WHERE email = $1 AND code = $2 AND purpose = $3
            RETURNING {CODE_COLUMNS}
            "#
        );
        let taken = self
            .timed(
                sqlx::query_as::<_, ResetCode>(&sql)
                    .bind(email)
                    .bind(code)
                    .bind(purpose)
                    .fetch_all(self.pool()),
            )
            .await?;
        Ok(taken.into_iter().max_by_key(|r| r.created_at))
    }
}
