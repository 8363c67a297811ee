use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    db::{PgStore, StoreError},
};

const USER_COLUMNS: &str = "id, name, surname, email, password_hash, role, is_verified, \
                            token, refresh_token, created_at, updated_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, new: &NewUser) -> Result<User, StoreError>;
    async fn delete_user_by_email(&self, email: &str) -> Result<u64, StoreError>;
    /// Returns false when no user has that email.
    async fn mark_user_verified(&self, email: &str) -> Result<bool, StoreError>;
    async fn update_user_password(&self, email: &str, password_hash: &str) -> Result<bool, StoreError>;
    async fn update_user_tokens(
        &self,
        id: Uuid,
        token: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError>;
    /// Total count plus one page, oldest first.
    async fn list_users(&self, limit: i64, offset: i64) -> Result<(i64, Vec<User>), StoreError>;
}

#[async_trait]
pub trait BlacklistRepo: Send + Sync {
    async fn blacklist_token(&self, token: &str) -> Result<(), StoreError>;
    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, StoreError>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.timed(
            sqlx::query_as::<_, User>(&sql)
                .bind(email)
                .fetch_optional(self.pool()),
        )
        .await
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.timed(
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(self.pool()),
        )
        .await
    }

    async fn create_user(&self, new: &NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (name, surname, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        self.timed(
            sqlx::query_as::<_, User>(&sql)
                .bind(&new.name)
                .bind(&new.surname)
                .bind(&new.email)
                .bind(&new.password_hash)
                .bind(new.role)
                .fetch_one(self.pool()),
        )
        .await
        .map_err(|e| e.unique_as_conflict("Email already exists"))
    }

    async fn delete_user_by_email(&self, email: &str) -> Result<u64, StoreError> {
        let res = self
            .timed(
                sqlx::query("DELETE FROM users WHERE email = $1")
                    .bind(email)
                    .execute(self.pool()),
            )
            .await?;
        Ok(res.rows_affected())
    }

    async fn mark_user_verified(&self, email: &str) -> Result<bool, StoreError> {
        let res = self
            .timed(
                sqlx::query(
                    "UPDATE users SET is_verified = TRUE, updated_at = now() WHERE email = $1",
                )
                .bind(email)
                .execute(self.pool()),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_user_password(&self, email: &str, password_hash: &str) -> Result<bool, StoreError> {
        let res = self
            .timed(
                sqlx::query(
                    "UPDATE users SET password_hash = $2, updated_at = now() WHERE email = $1",
                )
                .bind(email)
                .bind(password_hash)
                .execute(self.pool()),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_user_tokens(
        &self,
        id: Uuid,
        token: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError> {
        self.timed(
            sqlx::query(
                r#"
                UPDATE users
                   SET token = $2, refresh_token = $3, updated_at = now()
                 WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(token)
            .bind(refresh_token)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(i64, Vec<User>), StoreError> {
        let total: i64 = self
            .timed(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(self.pool()))
            .await?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        let users = self
            .timed(
                sqlx::query_as::<_, User>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool()),
            )
            .await?;
        Ok((total, users))
    }
}

#[async_trait]
impl BlacklistRepo for PgStore {
    async fn blacklist_token(&self, token: &str) -> Result<(), StoreError> {
        self.timed(
            sqlx::query(
                "INSERT INTO token_blacklist (token) VALUES ($1) ON CONFLICT (token) DO NOTHING",
            )
            .bind(token)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, StoreError> {
        self.timed(
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE token = $1)",
            )
            .bind(token)
            .fetch_one(self.pool()),
        )
        .await
    }
}
