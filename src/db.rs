use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::{
    auth::repo::{BlacklistRepo, UserRepo},
    config::DatabaseConfig,
    ledger::repo::LedgerRepo,
    products::repo::ProductRepo,
    reset::repo::ResetCodeRepo,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Conflict(String),
}

impl StoreError {
    /// Rewrites a unique-constraint violation as `Conflict`; other errors pass through.
    pub fn unique_as_conflict(self, message: &str) -> Self {
        let unique = matches!(
            &self,
            StoreError::Database(e)
                if e.as_database_error().is_some_and(|d| d.is_unique_violation())
        );
        if unique {
            StoreError::Conflict(message.into())
        } else {
            self
        }
    }
}

/// Everything the handlers need from persistence.
pub trait Store:
    UserRepo + BlacklistRepo + ResetCodeRepo + ProductRepo + LedgerRepo + Send + Sync
{
}

impl<T> Store for T where
    T: UserRepo + BlacklistRepo + ResetCodeRepo + ProductRepo + LedgerRepo + Send + Sync
{
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.call_timeout())
            .connect(&cfg.url)
            .await
            .context("connect to database")?;
        Ok(Self {
            pool,
            timeout: cfg.call_timeout(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs one database call under the configured per-call timeout.
    pub(crate) async fn timed<T, E, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, E>>,
        StoreError: From<E>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}
