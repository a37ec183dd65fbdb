//! Account service — registration, password login, demo accounts.
//!
//! Password storage is a placeholder: salted SHA-256, not a slow KDF.
//! Registration creates the user and their stall (with a starter menu) in
//! one transaction so a stall never exists without an owner.

use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::services::demo::{self, DEMO_EMAIL_DOMAIN};
use crate::services::session::{SessionUser, bytes_to_hex, generate_token};
use crate::services::stall::{self, StallError};

pub const MIN_PASSWORD_LEN: usize = 8;
const DEMO_PASSWORD_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("name must not be blank")]
    BlankName,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid stall: {0}")]
    InvalidStall(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub stall_name: Option<String>,
}

/// Account plus the stall it owns.
#[derive(Debug, Clone)]
pub struct Account {
    pub user: SessionUser,
    pub stall_id: Uuid,
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Check a registration payload and return the normalized email.
///
/// # Errors
///
/// Returns `InvalidEmail`, `BlankName`, or `WeakPassword`.
pub fn validate_registration(reg: &Registration) -> Result<String, AuthError> {
    let email = normalize_email(&reg.email).ok_or(AuthError::InvalidEmail)?;
    if reg.name.trim().is_empty() {
        return Err(AuthError::BlankName);
    }
    if reg.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(email)
}

/// Register an owner and create their stall.
///
/// # Errors
///
/// Returns a validation error, `EmailTaken`, or a database error.
pub async fn register(pool: &PgPool, reg: Registration) -> Result<Account, AuthError> {
    let email = validate_registration(&reg)?;
    let name = reg.name.trim().to_owned();
    let is_demo = demo::is_demo_email(&email);

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if taken {
        return Err(AuthError::EmailTaken);
    }

    let stall_name = reg
        .stall_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| format!("{name}'s Stall"), str::to_owned);

    let account = create_account(pool, &name, &email, &reg.password, &stall_name, is_demo).await?;
    info!(user_id = %account.user.id, stall_id = %account.stall_id, is_demo, "owner registered");
    Ok(account)
}

/// Create a throwaway demo owner with a demo stall.
///
/// # Errors
///
/// Returns a database error if the inserts fail.
pub async fn create_demo_account(pool: &PgPool) -> Result<Account, AuthError> {
    let tag = &generate_token()[..8];
    let email = format!("demo-{tag}@{DEMO_EMAIL_DOMAIN}");
    let password = generate_token()[..DEMO_PASSWORD_LEN].to_owned();
    let account = create_account(pool, "Demo Hawker", &email, &password, "Demo Noodle House", true).await?;
    info!(user_id = %account.user.id, stall_id = %account.stall_id, "demo account created");
    Ok(account)
}

async fn create_account(
    pool: &PgPool,
    name: &str,
    email: &str,
    password: &str,
    stall_name: &str,
    is_demo: bool,
) -> Result<Account, AuthError> {
    let user_id = Uuid::new_v4();
    let salt = generate_token();
    let password_hash = hash_password(&salt, password);

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO users (id, name, email, password_salt, password_hash, is_demo) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user_id)
    .bind(name)
    .bind(email)
    .bind(&salt)
    .bind(&password_hash)
    .bind(is_demo)
    .execute(&mut *tx)
    .await;
    if let Err(e) = inserted {
        // Lost a race with a concurrent registration for the same email.
        if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
            return Err(AuthError::EmailTaken);
        }
        return Err(e.into());
    }
    let stall = stall::create_stall(&mut tx, user_id, stall_name, is_demo)
        .await
        .map_err(|e| match e {
            StallError::Database(db) => AuthError::Db(db),
            other => AuthError::InvalidStall(other.to_string()),
        })?;
    tx.commit().await?;

    Ok(Account {
        user: SessionUser { id: user_id, name: name.to_owned(), email: email.to_owned(), is_demo },
        stall_id: stall.id,
    })
}

/// Verify email + password.
///
/// # Errors
///
/// Returns `InvalidCredentials` on any mismatch.
pub async fn login(pool: &PgPool, email: &str, password: &str) -> Result<SessionUser, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
    let row = sqlx::query("SELECT id, name, email, is_demo, password_salt, password_hash FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let salt: String = row.get("password_salt");
    let expected: String = row.get("password_hash");
    if hash_password(&salt, password) != expected {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(SessionUser { id: row.get("id"), name: row.get("name"), email: row.get("email"), is_demo: row.get("is_demo") })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
