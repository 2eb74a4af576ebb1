use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::User;

#[derive(Debug)]
pub enum AccountUpdate {
    Updated(User),
    EmailTaken,
    Missing,
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_foreign_key_violation())
        .unwrap_or(false)
}

impl User {
    /// Find a user by email (exact match).
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, profile_image, followers_count, following_count,
                   is_active, is_staff, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, profile_image, followers_count, following_count,
                   is_active, is_staff, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Create a new user with hashed password. `None` when the email is taken.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, password_hash, profile_image, followers_count, following_count,
                      is_active, is_staff, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_optional(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, profile_image, followers_count, following_count,
                   is_active, is_staff, created_at, updated_at
            FROM users
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list users")?;
        Ok(rows)
    }

    /// Applies the email and/or password change in one statement; `None`
    /// leaves a column untouched.
    pub async fn update_account(
        db: &PgPool,
        id: Uuid,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> anyhow::Result<AccountUpdate> {
        let result = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   password_hash = COALESCE($3, password_hash),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, email, password_hash, profile_image, followers_count, following_count,
                      is_active, is_staff, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(db)
        .await;

        match result {
            Ok(Some(user)) => Ok(AccountUpdate::Updated(user)),
            Ok(None) => Ok(AccountUpdate::Missing),
            Err(e) if is_unique_violation(&e) => Ok(AccountUpdate::EmailTaken),
            Err(e) => Err(e).context("update user account"),
        }
    }

    pub async fn set_password_hash(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<bool> {
        let affected = sqlx::query(
            r#"UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await
        .context("update user password")?
        .rows_affected();
        Ok(affected == 1)
    }

    /// Swaps the stored profile image key and returns the previous one.
    pub async fn replace_profile_image(
        db: &PgPool,
        id: Uuid,
        key: &str,
    ) -> anyhow::Result<Option<Option<String>>> {
        let previous = sqlx::query_scalar::<_, Option<String>>(
            r#"
            UPDATE users u
               SET profile_image = $2, updated_at = now()
              FROM (SELECT id, profile_image FROM users WHERE id = $1 FOR UPDATE) old
             WHERE u.id = old.id
            RETURNING old.profile_image
            "#,
        )
        .bind(id)
        .bind(key)
        .fetch_optional(db)
        .await
        .context("update profile image")?;
        Ok(previous)
    }
}
