use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// An association profile. Missions are owned by their association via
/// `Mission.association_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub association_id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub wilaya: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
    pub logo: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}
