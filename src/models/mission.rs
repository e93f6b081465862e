use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Mission lifecycle. The only driven transition is `open -> closed`;
/// `completed` is representable for stored documents but nothing sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Open,
    Closed,
    Completed,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Open => "open",
            MissionStatus::Closed => "closed",
            MissionStatus::Completed => "completed",
        }
    }
}

/// Per-applicant decision state inside a mission.
/// `pending -> accepted` or `pending -> rejected`, no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicantStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A volunteer's application record embedded in a mission. At most one entry
/// per volunteer id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Applicant {
    pub volunteer_id: String,
    pub status: ApplicantStatus,
    pub applied_at: DateTime<Utc>,
}

/// A volunteering opportunity posted by an association.
///
/// `accepted_volunteers` is an ordered Vec with set semantics: containment is
/// checked before every push and the store side uses `$addToSet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub mission_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub wilaya: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<String>,
    pub association_id: String,
    #[serde(default)]
    pub applicants: Vec<Applicant>,
    #[serde(default)]
    pub accepted_volunteers: Vec<String>,
    #[serde(default)]
    pub max_volunteers: i32,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    pub fn applicant(&self, volunteer_id: &str) -> Option<&Applicant> {
        self.applicants.iter().find(|a| a.volunteer_id == volunteer_id)
    }
}
