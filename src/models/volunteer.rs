use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Status of an application as seen from the volunteer's side. `completed`
/// exists in stored documents but no operation currently produces it; the
/// history endpoint derives completion from the mission's end date instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

/// Volunteer-side mirror of a mission applicant entry. At most one record
/// per mission id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionApplication {
    pub mission_id: String,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
}

/// A volunteer profile. `history` and `applied_missions` hold weak references
/// to missions; the cascade pass keeps them free of dangling ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volunteer {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub volunteer_id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub wilaya: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Mission ids of closed missions the volunteer took part in.
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub applied_missions: Vec<MissionApplication>,
    pub created_at: DateTime<Utc>,
}
