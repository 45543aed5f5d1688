use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,                    // unique user ID
    pub email: String,              // user email
    #[serde(skip_serializing)]
    pub password: String,           // "salt.hash" scrypt encoding, not exposed in JSON
    pub created_at: OffsetDateTime, // creation timestamp
}

/// Partial attribute set for administrative updates. Absent fields keep
/// their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
}
