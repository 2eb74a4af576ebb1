use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::User;

/// Users following `user_id`, most recent follow first.
pub async fn list_followers(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.password_hash, u.profile_image, u.followers_count,
               u.following_count, u.is_active, u.is_staff, u.created_at, u.updated_at
          FROM follows f
          JOIN users u ON u.id = f.follower_id
         WHERE f.followed_id = $1
         ORDER BY f.created_at DESC, u.id
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list followers")?;
    Ok(rows)
}

/// Users that `user_id` follows, most recent follow first.
pub async fn list_following(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.password_hash, u.profile_image, u.followers_count,
               u.following_count, u.is_active, u.is_staff, u.created_at, u.updated_at
          FROM follows f
          JOIN users u ON u.id = f.followed_id
         WHERE f.follower_id = $1
         ORDER BY f.created_at DESC, u.id
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list following")?;
    Ok(rows)
}
