//! In-memory store and recording mailer backing the unit and router tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        password::Passwords,
        repo::{BlacklistRepo, UserRepo},
        repo_types::{NewUser, Role, User},
    },
    config::PasswordConfig,
    db::StoreError,
    ledger::repo::{LedgerRepo, NewTransaction, Transaction},
    mailer::{CodePurpose, Mailer},
    products::{
        repo::ProductRepo,
        repo_types::{NewProduct, Product, ProductPatch},
    },
    reset::repo::{ResetCode, ResetCodeRepo},
};

/// Cheap hashing parameters so tests do not pay for production cost.
pub fn test_password_config() -> PasswordConfig {
    PasswordConfig {
        cost: 1,
        memory_kib: 1024,
    }
}

pub fn test_passwords() -> Passwords {
    Passwords::new(&test_password_config()).expect("test password params")
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    blacklist: Vec<String>,
    reset_codes: Vec<ResetCode>,
    products: Vec<Product>,
    transactions: Vec<Transaction>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_ledger: AtomicBool,
}

fn apply_patch(patch: &ProductPatch, product: &mut Product) {
    if let Some(barcode) = &patch.barcode {
        product.barcode = barcode.clone();
    }
    if let Some(name) = &patch.name {
        product.name = name.clone();
    }
    if let Some(description) = &patch.description {
        product.description = description.clone();
    }
    if let Some(price) = patch.price {
        product.price = price;
    }
    if let Some(stock) = patch.stock {
        product.stock = stock;
    }
    product.updated_at = OffsetDateTime::now_utc();
}

fn page<T: Clone>(rows: &[T], limit: i64, offset: i64) -> Vec<T> {
    rows.iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

impl MemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().expect("tables lock");
        f(&mut tables)
    }

    pub fn fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger.store(fail, Ordering::SeqCst);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.with(|t| t.transactions.clone())
    }

    pub fn reset_codes(&self) -> Vec<ResetCode> {
        self.with(|t| t.reset_codes.clone())
    }

    pub fn products(&self) -> Vec<Product> {
        self.with(|t| t.products.clone())
    }

    pub fn user(&self, email: &str) -> Option<User> {
        self.with(|t| t.users.iter().find(|u| u.email == email).cloned())
    }

    /// Inserts a user directly, bypassing signup.
    pub fn seed_user(&self, email: &str, password: &str, role: Role, verified: bool) -> User {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            surname: "User".into(),
            email: email.into(),
            password_hash: test_passwords().hash(password).expect("hash"),
            role,
            is_verified: verified,
            token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        self.with(|t| t.users.push(user.clone()));
        user
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.user(email))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn create_user(&self, new: &NewUser) -> Result<User, StoreError> {
        self.with(|t| {
            if t.users.iter().any(|u| u.email == new.email) {
                return Err(StoreError::Conflict("Email already exists".into()));
            }
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: Uuid::new_v4(),
                name: new.name.clone(),
                surname: new.surname.clone(),
                email: new.email.clone(),
                password_hash: new.password_hash.clone(),
                role: new.role,
                is_verified: false,
                token: None,
                refresh_token: None,
                created_at: now,
                updated_at: now,
            };
            t.users.push(user.clone());
            Ok(user)
        })
    }

    async fn delete_user_by_email(&self, email: &str) -> Result<u64, StoreError> {
        Ok(self.with(|t| {
            let before = t.users.len();
            t.users.retain(|u| u.email != email);
            (before - t.users.len()) as u64
        }))
    }

    async fn mark_user_verified(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.with(|t| match t.users.iter_mut().find(|u| u.email == email) {
            Some(u) => {
                u.is_verified = true;
                true
            }
            None => false,
        }))
    }

    async fn update_user_password(&self, email: &str, password_hash: &str) -> Result<bool, StoreError> {
        Ok(self.with(|t| match t.users.iter_mut().find(|u| u.email == email) {
            Some(u) => {
                u.password_hash = password_hash.into();
                true
            }
            None => false,
        }))
    }

    async fn update_user_tokens(
        &self,
        id: Uuid,
        token: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError> {
        self.with(|t| {
            if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
                u.token = Some(token.into());
                u.refresh_token = Some(refresh_token.into());
            }
        });
        Ok(())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(i64, Vec<User>), StoreError> {
        Ok(self.with(|t| (t.users.len() as i64, page(&t.users, limit, offset))))
    }
}

#[async_trait]
impl BlacklistRepo for MemoryStore {
    async fn blacklist_token(&self, token: &str) -> Result<(), StoreError> {
        self.with(|t| {
            if !t.blacklist.iter().any(|b| b == token) {
                t.blacklist.push(token.into());
            }
        });
        Ok(())
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.with(|t| t.blacklist.iter().any(|b| b == token)))
    }
}

#[async_trait]
impl ResetCodeRepo for MemoryStore {
    async fn insert_reset_code(&self, code: &ResetCode) -> Result<(), StoreError> {
        self.with(|t| t.reset_codes.push(code.clone()));
        Ok(())
    }

    async fn find_reset_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<Option<ResetCode>, StoreError> {
        Ok(self.with(|t| {
            t.reset_codes
                .iter()
                .filter(|r| r.email == email && r.code == code && r.purpose == purpose)
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn take_reset_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<Option<ResetCode>, StoreError> {
        Ok(self.with(|t| {
            let (taken, kept): (Vec<ResetCode>, Vec<ResetCode>) = t
                .reset_codes
                .drain(..)
                .partition(|r| r.email == email && r.code == code && r.purpose == purpose);
            t.reset_codes = kept;
            taken.into_iter().max_by_key(|r| r.created_at)
        }))
    }
}

#[async_trait]
impl ProductRepo for MemoryStore {
    async fn barcode_exists(&self, barcode: &str) -> Result<bool, StoreError> {
        Ok(self.with(|t| t.products.iter().any(|p| p.barcode == barcode)))
    }

    async fn insert_product(&self, new: &NewProduct) -> Result<Product, StoreError> {
        self.with(|t| {
            if t.products.iter().any(|p| p.barcode == new.barcode) {
                return Err(StoreError::Conflict("Product already exists".into()));
            }
            let now = OffsetDateTime::now_utc();
            let product = Product {
                id: Uuid::new_v4(),
                barcode: new.barcode.clone(),
                name: new.name.clone(),
                description: new.description.clone(),
                price: new.price,
                stock: new.stock,
                created_at: now,
                updated_at: now,
            };
            t.products.push(product.clone());
            Ok(product)
        })
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.with(|t| t.products.iter().find(|p| p.id == id).cloned()))
    }

    async fn list_products(&self, limit: i64, offset: i64) -> Result<(i64, Vec<Product>), StoreError> {
        Ok(self.with(|t| (t.products.len() as i64, page(&t.products, limit, offset))))
    }

    async fn search_products_by_barcode(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<Product>, StoreError> {
        Ok(self.with(|t| {
            let mut hits: Vec<Product> = t
                .products
                .iter()
                .filter(|p| p.barcode.starts_with(prefix))
                .cloned()
                .collect();
            hits.sort_by(|a, b| a.barcode.cmp(&b.barcode));
            hits.truncate(limit.max(0) as usize);
            hits
        }))
    }

    async fn replace_product(&self, id: Uuid, new: &NewProduct) -> Result<Option<Product>, StoreError> {
        let patch = ProductPatch {
            barcode: Some(new.barcode.clone()),
            name: Some(new.name.clone()),
            description: Some(new.description.clone()),
            price: Some(new.price),
            stock: Some(new.stock),
        };
        self.patch_product(id, &patch).await
    }

    async fn patch_product(&self, id: Uuid, patch: &ProductPatch) -> Result<Option<Product>, StoreError> {
        self.with(|t| {
            if let Some(barcode) = &patch.barcode {
                if t.products.iter().any(|p| p.id != id && &p.barcode == barcode) {
                    return Err(StoreError::Conflict("Product already exists".into()));
                }
            }
            Ok(t.products.iter_mut().find(|p| p.id == id).map(|p| {
                apply_patch(patch, p);
                p.clone()
            }))
        })
    }

    async fn delete_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.with(|t| {
            let idx = t.products.iter().position(|p| p.id == id)?;
            Some(t.products.remove(idx))
        }))
    }
}

#[async_trait]
impl LedgerRepo for MemoryStore {
    async fn append_transaction(&self, entry: &NewTransaction) -> Result<Transaction, StoreError> {
        if self.fail_ledger.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            product_id: entry.product_id,
            kind: entry.kind,
            amount: entry.amount,
            processed_at: OffsetDateTime::now_utc(),
        };
        self.with(|t| t.transactions.push(tx.clone()));
        Ok(tx)
    }
}

/// Mailer that keeps every code it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, CodePurpose, String)>>,
}

impl RecordingMailer {
    /// Most recent code sent to `to`.
    pub fn last_code(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .expect("sent lock")
            .iter()
            .rev()
            .find(|(addr, _, _)| addr == to)
            .map(|(_, _, code)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sent lock").len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_code(&self, to: &str, purpose: CodePurpose, code: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((to.to_string(), purpose, code.to_string()));
        Ok(())
    }
}
