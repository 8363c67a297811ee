use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    claims::Identity,
    dto::{LoginRequest, SignupRequest},
    jwt::{JwtKeys, TokenPair},
    password::Passwords,
    repo_types::{NewUser, Role, User},
};
use crate::{
    db::Store,
    error::{AppError, AppResult},
    mailer::CodePurpose,
    reset::services::ResetCodes,
    validation::normalize_email,
};

/// Creates an unverified account and mails its verification code.
///
/// An existing unverified account with the same email is treated as
/// abandoned and removed first; a verified one is a conflict. Only an
/// authenticated admin (`caller`) may create another admin.
pub async fn signup(
    store: &dyn Store,
    codes: &ResetCodes<'_>,
    passwords: &Passwords,
    mut req: SignupRequest,
    caller: Option<Role>,
) -> AppResult<User> {
    req.normalize();
    req.validate()?;

    if req.role == Role::Admin && caller != Some(Role::Admin) {
        warn!(email = %req.email, ?caller, "admin signup without admin caller");
        return Err(AppError::Forbidden(
            "only an admin can create admin accounts".into(),
        ));
    }

    if let Some(existing) = store.find_user_by_email(&req.email).await? {
        if existing.is_verified {
            warn!(email = %req.email, "signup for registered email");
            return Err(AppError::Conflict("Email already exists".into()));
        }
        store.delete_user_by_email(&req.email).await?;
        info!(email = %req.email, user_id = %existing.id, "abandoned unverified account removed");
    }

    let user = store
        .create_user(&NewUser {
            name: req.name,
            surname: req.surname,
            email: req.email,
            password_hash: passwords.hash(&req.password)?,
            role: req.role,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user signed up");

    codes
        .generate(&user.email, CodePurpose::EmailVerification, OffsetDateTime::now_utc())
        .await?;
    Ok(user)
}

/// Checks credentials, issues a token pair and stores it on the user.
pub async fn login(
    store: &dyn Store,
    keys: &JwtKeys,
    passwords: &Passwords,
    req: LoginRequest,
) -> AppResult<(User, TokenPair)> {
    let email = normalize_email(&req.email);
    let invalid = || AppError::Unauthorized("email or password is incorrect".into());

    let Some(user) = store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };
    if !passwords.verify(&req.password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }
    if !user.is_verified {
        return Err(AppError::Forbidden("email is not verified".into()));
    }

    let pair = keys
        .issue(&Identity::from(&user))
        .map_err(|e| AppError::Internal(e.into()))?;
    store
        .update_user_tokens(user.id, &pair.access_token, &pair.refresh_token)
        .await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((user, pair))
}

/// Revokes `token` for every later request.
pub async fn logout(store: &dyn Store, token: &str) -> AppResult<()> {
    store.blacklist_token(token).await?;
    Ok(())
}
