use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,               // unique, compared as stored
    #[serde(skip_serializing)]
    pub password_hash: String,       // Argon2 hash, not exposed in JSON
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub token: Option<String>,       // current session token, rotated on every sign-in
    pub created_at: OffsetDateTime,
}

/// Fields supplied when creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
