//! Password hashing and token bookkeeping.
//!
//! Tokens are opaque random keys stored in `auth_tokens`, one per user. Login
//! reuses an existing key; logout deletes it, which revokes every session of
//! that user at once.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, AppResult};

/// The authenticated caller, as resolved from a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// Returns `Ok(false)` for a wrong password; errors only on a corrupt hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

fn generate_token_key() -> String {
    // 40 hex chars, same shape as the classic DRF token keys
    let a = uuid::Uuid::new_v4().simple().to_string();
    let b = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", a, &b[..8])
}

/// Returns the user's token, creating one when none exists.
pub async fn get_or_create_token(db: &SqlitePool, user_id: i64) -> AppResult<String> {
    let candidate = generate_token_key();
    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES (?1, ?2) ON CONFLICT(user_id) DO NOTHING")
        .bind(&candidate)
        .bind(user_id)
        .execute(db)
        .await?;
    let key: String = sqlx::query_scalar("SELECT key FROM auth_tokens WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(key)
}

pub async fn revoke_token(db: &SqlitePool, user_id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?1").bind(user_id).execute(db).await?;
    Ok(())
}

pub async fn resolve_token(db: &SqlitePool, key: &str) -> AppResult<Option<AuthUser>> {
    let row = sqlx::query(
        r#"SELECT u.id, u.username, u.email, u.is_staff
           FROM auth_tokens t JOIN users u ON u.id = t.user_id
           WHERE t.key = ?1"#,
    )
    .bind(key)
    .fetch_optional(db)
    .await?;

    Ok(row.map(|r| AuthUser {
        id: r.get("id"),
        username: r.get("username"),
        email: r.get("email"),
        is_staff: r.get::<i64, _>("is_staff") != 0,
    }))
}

/// Checks email + password and returns the matching user id.
pub async fn authenticate(db: &SqlitePool, email: &str, password: &str) -> AppResult<i64> {
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?1")
        .bind(email.trim())
        .fetch_optional(db)
        .await?;

    let invalid = || AppError::BadRequest("Unable to log in with provided credentials".to_string());
    let row = row.ok_or_else(invalid)?;
    let hash: String = row.get("password_hash");
    if !verify_password(password, &hash)? {
        return Err(invalid());
    }
    Ok(row.get("id"))
}
