use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,         // argon2 PHC string
    pub profile_image: Option<String>, // object-storage key
    pub followers_count: i64,
    pub following_count: i64,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
