use rand::Rng;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::repo::ResetCode;
use crate::{
    auth::password::Passwords,
    db::{Store, StoreError},
    error::AppError,
    mailer::{CodePurpose, Mailer},
    state::AppState,
};

#[derive(Debug, Error)]
pub enum ResetCodeError {
    #[error("invalid code")]
    NotFound,
    #[error("expired code")]
    Expired,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ResetCodeError> for AppError {
    fn from(e: ResetCodeError) -> Self {
        match e {
            ResetCodeError::NotFound => AppError::NotFound("invalid code".into()),
            ResetCodeError::Expired => AppError::Unauthorized("expired code".into()),
            ResetCodeError::Store(s) => AppError::Store(s),
            ResetCodeError::Internal(i) => AppError::Internal(i),
        }
    }
}

/// Six ASCII digits from the thread-local CSPRNG.
pub fn random_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// One-time code lifecycle shared by email verification and password reset.
/// A code only answers for the purpose it was generated for.
pub struct ResetCodes<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    passwords: &'a Passwords,
    ttl: Duration,
}

impl<'a> ResetCodes<'a> {
    pub fn new(
        store: &'a dyn Store,
        mailer: &'a dyn Mailer,
        passwords: &'a Passwords,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            mailer,
            passwords,
            ttl,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(
            state.store.as_ref(),
            state.mailer.as_ref(),
            state.passwords.as_ref(),
            Duration::seconds(state.config.reset_code_ttl_secs),
        )
    }

    /// Stores a fresh code for `email` and mails it. Delivery failures are
    /// logged only; the stored code stays usable.
    pub async fn generate(
        &self,
        email: &str,
        purpose: CodePurpose,
        now: OffsetDateTime,
    ) -> Result<String, ResetCodeError> {
        let record = ResetCode {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code: random_code(),
            purpose,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.store.insert_reset_code(&record).await?;
        info!(email = %email, ?purpose, "one-time code generated");

        if let Err(e) = self.mailer.send_code(email, purpose, &record.code).await {
            warn!(error = ?e, email = %email, ?purpose, "code delivery failed");
        }
        Ok(record.code)
    }

    /// Matches (email, code, purpose) and checks `now < expires_at`.
    /// Leaves the record in place.
    pub async fn validate(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        now: OffsetDateTime,
    ) -> Result<ResetCode, ResetCodeError> {
        let record = self
            .store
            .find_reset_code(email, code, purpose)
            .await?
            .ok_or(ResetCodeError::NotFound)?;
        live(record, now)
    }

    #[cfg(test)]
    pub async fn is_valid(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        now: OffsetDateTime,
    ) -> bool {
        self.validate(email, code, purpose, now).await.is_ok()
    }

    /// Deletes the code and returns it if it was still live. An expired code
    /// is deleted as well.
    async fn take(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        now: OffsetDateTime,
    ) -> Result<ResetCode, ResetCodeError> {
        let record = self
            .store
            .take_reset_code(email, code, purpose)
            .await?
            .ok_or(ResetCodeError::NotFound)?;
        live(record, now)
    }

    /// Replaces the password of `email`. The new hash is computed before the
    /// code is claimed, so a hashing failure leaves the code usable. Of two
    /// concurrent calls only one claims the code.
    pub async fn consume(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<(), ResetCodeError> {
        self.validate(email, code, CodePurpose::PasswordReset, now)
            .await?;
        let hash = self.passwords.hash(new_password)?;
        self.take(email, code, CodePurpose::PasswordReset, now).await?;
        if !self.store.update_user_password(email, &hash).await? {
            return Err(ResetCodeError::NotFound);
        }
        info!(email = %email, "password reset");
        Ok(())
    }

    /// Flips the verified flag of `email` after claiming the code.
    pub async fn verify_email(
        &self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> Result<(), ResetCodeError> {
        self.take(email, code, CodePurpose::EmailVerification, now)
            .await?;
        if !self.store.mark_user_verified(email).await? {
            return Err(ResetCodeError::NotFound);
        }
        info!(email = %email, "email verified");
        Ok(())
    }
}

fn live(record: ResetCode, now: OffsetDateTime) -> Result<ResetCode, ResetCodeError> {
    if record.is_live_at(now) {
        Ok(record)
    } else {
        Err(ResetCodeError::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo_types::Role,
        reset::repo::ResetCodeRepo,
        testing::{test_passwords, MemoryStore, RecordingMailer},
    };

    fn codes<'a>(
        store: &'a MemoryStore,
        mailer: &'a RecordingMailer,
        passwords: &'a Passwords,
    ) -> ResetCodes<'a> {
        ResetCodes::new(store, mailer, passwords, Duration::seconds(60))
    }

    async fn insert(store: &MemoryStore, email: &str, code: &str, purpose: CodePurpose, now: OffsetDateTime) {
        store
            .insert_reset_code(&ResetCode {
                id: Uuid::new_v4(),
                email: email.into(),
                code: code.into(),
                purpose,
                created_at: now,
                expires_at: now + Duration::seconds(60),
            })
            .await
            .unwrap();
    }

    #[test]
    fn random_code_is_six_digits() {
        for _ in 0..100 {
            let code = random_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn code_expires_after_ttl_and_fresh_code_validates() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        let codes = codes(&store, &mailer, &pw);
        let purpose = CodePurpose::EmailVerification;
        let t0 = OffsetDateTime::now_utc();

        let first = codes.generate("a@x.com", purpose, t0).await.unwrap();
        assert_eq!(mailer.last_code("a@x.com").as_deref(), Some(first.as_str()));

        let later = t0 + Duration::seconds(61);
        assert!(!codes.is_valid("a@x.com", &first, purpose, later).await);
        assert!(matches!(
            codes.validate("a@x.com", &first, purpose, later).await,
            Err(ResetCodeError::Expired)
        ));

        let fresh = codes.generate("a@x.com", purpose, later).await.unwrap();
        assert!(codes.is_valid("a@x.com", &fresh, purpose, later).await);
    }

    #[tokio::test]
    async fn code_is_valid_only_for_matching_pair_before_expiry() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        let codes = codes(&store, &mailer, &pw);
        let purpose = CodePurpose::PasswordReset;
        let t0 = OffsetDateTime::now_utc();
        let code = codes.generate("a@x.com", purpose, t0).await.unwrap();

        assert!(codes.is_valid("a@x.com", &code, purpose, t0).await);
        assert!(codes.is_valid("a@x.com", &code, purpose, t0 + Duration::seconds(59)).await);
        assert!(!codes.is_valid("a@x.com", &code, purpose, t0 + Duration::seconds(60)).await);
        assert!(!codes.is_valid("b@x.com", &code, purpose, t0).await);
        assert!(matches!(
            codes.validate("a@x.com", "not-it", purpose, t0).await,
            Err(ResetCodeError::NotFound)
        ));
    }

    #[tokio::test]
    async fn verification_code_cannot_reset_password() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        store.seed_user("a@x.com", "oldpass", Role::User, true);
        let codes = codes(&store, &mailer, &pw);
        let now = OffsetDateTime::now_utc();
        let code = codes
            .generate("a@x.com", CodePurpose::EmailVerification, now)
            .await
            .unwrap();

        let res = codes.consume("a@x.com", &code, "newpass", now).await;
        assert!(matches!(res, Err(ResetCodeError::NotFound)));
        let user = store.user("a@x.com").unwrap();
        assert!(pw.verify("oldpass", &user.password_hash).unwrap());
        assert_eq!(store.reset_codes().len(), 1);
    }

    #[tokio::test]
    async fn reset_code_cannot_verify_email() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        store.seed_user("a@x.com", "secret1", Role::User, false);
        let codes = codes(&store, &mailer, &pw);
        let now = OffsetDateTime::now_utc();
        let code = codes
            .generate("a@x.com", CodePurpose::PasswordReset, now)
            .await
            .unwrap();

        let res = codes.verify_email("a@x.com", &code, now).await;
        assert!(matches!(res, Err(ResetCodeError::NotFound)));
        assert!(!store.user("a@x.com").unwrap().is_verified);
    }

    #[tokio::test]
    async fn consumed_code_cannot_be_reused() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        store.seed_user("a@x.com", "oldpass", Role::User, true);
        let codes = codes(&store, &mailer, &pw);
        let now = OffsetDateTime::now_utc();
        let code = codes
            .generate("a@x.com", CodePurpose::PasswordReset, now)
            .await
            .unwrap();

        codes.consume("a@x.com", &code, "newpass", now).await.unwrap();
        let user = store.user("a@x.com").unwrap();
        assert!(pw.verify("newpass", &user.password_hash).unwrap());

        let again = codes.consume("a@x.com", &code, "other1", now).await;
        assert!(matches!(again, Err(ResetCodeError::NotFound)));
    }

    #[tokio::test]
    async fn concurrent_consume_succeeds_once() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        store.seed_user("a@x.com", "oldpass", Role::User, true);
        let codes = codes(&store, &mailer, &pw);
        let now = OffsetDateTime::now_utc();
        let code = codes
            .generate("a@x.com", CodePurpose::PasswordReset, now)
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            codes.consume("a@x.com", &code, "first1", now),
            codes.consume("a@x.com", &code, "second2", now),
        );
        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        assert!(store.reset_codes().is_empty());
    }

    #[tokio::test]
    async fn expired_reset_code_leaves_password_unchanged() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        store.seed_user("a@x.com", "oldpass", Role::User, true);
        let codes = codes(&store, &mailer, &pw);
        let t0 = OffsetDateTime::now_utc();
        let code = codes
            .generate("a@x.com", CodePurpose::PasswordReset, t0)
            .await
            .unwrap();

        let late = t0 + Duration::seconds(120);
        let res = codes.consume("a@x.com", &code, "newpass", late).await;
        assert!(matches!(res, Err(ResetCodeError::Expired)));
        let user = store.user("a@x.com").unwrap();
        assert!(pw.verify("oldpass", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn consume_deletes_only_the_matching_pair() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        store.seed_user("a@x.com", "oldpass", Role::User, true);
        let now = OffsetDateTime::now_utc();
        let shared = "123456";
        for email in ["a@x.com", "b@x.com"] {
            insert(&store, email, shared, CodePurpose::PasswordReset, now).await;
        }
        insert(&store, "a@x.com", shared, CodePurpose::EmailVerification, now).await;

        codes(&store, &mailer, &pw)
            .consume("a@x.com", shared, "newpass", now)
            .await
            .unwrap();

        let left = store.reset_codes();
        assert_eq!(left.len(), 2);
        assert!(left
            .iter()
            .any(|r| r.email == "b@x.com" && r.purpose == CodePurpose::PasswordReset));
        assert!(left
            .iter()
            .any(|r| r.email == "a@x.com" && r.purpose == CodePurpose::EmailVerification));
    }

    #[tokio::test]
    async fn verify_email_flips_flag() {
        let (store, mailer, pw) = (MemoryStore::default(), RecordingMailer::default(), test_passwords());
        store.seed_user("a@x.com", "secret1", Role::User, false);
        let codes = codes(&store, &mailer, &pw);
        let now = OffsetDateTime::now_utc();
        let code = codes
            .generate("a@x.com", CodePurpose::EmailVerification, now)
            .await
            .unwrap();

        codes.verify_email("a@x.com", &code, now).await.unwrap();
        assert!(store.user("a@x.com").unwrap().is_verified);
        assert!(store.reset_codes().is_empty());
    }
}
