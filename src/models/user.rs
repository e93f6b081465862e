use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Account role; decides which profile document (volunteer or association)
/// is attached to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Volunteer,
    Association,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Volunteer => "volunteer",
            Role::Association => "association",
        }
    }
}

/// An account. Owns exactly one Volunteer or Association profile, 1:1 by role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub email: String,
    /// bcrypt hash, never the plaintext. Response payloads are built from
    /// individual fields so this never leaves the API.
    pub password: String,
    pub role: Role,
    pub profile_photo: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
