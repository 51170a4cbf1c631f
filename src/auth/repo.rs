use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::tokens::TokenPurpose;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, is_verified, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, is_verified, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new, unverified user with hashed password.
    pub async fn create(
        db: &PgPool,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, name, password_hash, is_verified, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_name(db: &PgPool, id: Uuid, name: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET name = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, email, name, password_hash, is_verified, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

// --- refresh-token ledger ---

/// Record a freshly issued refresh token.
pub async fn record_refresh(
    db: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn is_refresh_revoked(db: &PgPool, jti: Uuid) -> anyhow::Result<bool> {
    let revoked: Option<bool> =
        sqlx::query_scalar("SELECT revoked FROM refresh_tokens WHERE jti = $1")
            .bind(jti)
            .fetch_optional(db)
            .await?;
    Ok(revoked.unwrap_or(false))
}

/// Revoke a single refresh token, inserting the ledger row if the token was
/// issued before the ledger knew about it.
pub async fn revoke_refresh(
    db: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (jti, user_id, expires_at, revoked)
        VALUES ($1, $2, $3, TRUE)
        ON CONFLICT (jti) DO UPDATE SET revoked = TRUE
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Revoke every outstanding refresh token for a user (password change).
pub async fn revoke_all_refresh_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

// --- account tokens (email verification / password reset) ---

pub async fn create_account_token(
    db: &PgPool,
    user_id: Uuid,
    purpose: TokenPurpose,
    token_hash: &str,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO account_tokens (user_id, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(token_hash)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Atomically mark a live token as used. Returns false when the token is
/// unknown, expired, already used, or bound to another purpose/user.
pub async fn consume_account_token(
    db: &PgPool,
    user_id: Uuid,
    purpose: TokenPurpose,
    token_hash: &str,
) -> anyhow::Result<bool> {
    let consumed: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE account_tokens
        SET used = TRUE
        WHERE user_id = $1 AND purpose = $2 AND token_hash = $3
          AND NOT used AND expires_at > now()
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(token_hash)
    .fetch_optional(db)
    .await?;
    Ok(consumed.is_some())
}
