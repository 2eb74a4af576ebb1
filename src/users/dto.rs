use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;
use crate::{storage::StorageClient, uploads};

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub profile_image: Option<String>, // presigned URL
    pub followers_count: i64,
    pub following_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserResponse {
    pub async fn present(storage: &dyn StorageClient, user: &User) -> anyhow::Result<Self> {
        Ok(Self {
            id: user.id,
            email: user.email.clone(),
            profile_image: uploads::presign(storage, user.profile_image.as_deref()).await?,
            followers_count: user.followers_count,
            following_count: user.following_count,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    pub async fn present_all(storage: &dyn StorageClient, users: &[User]) -> anyhow::Result<Vec<Self>> {
        let mut out = Vec::with_capacity(users.len());
        for user in users {
            out.push(Self::present(storage, user).await?);
        }
        Ok(out)
    }
}

/// PATCH body; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}
