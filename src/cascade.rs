// src/cascade.rs
//
// Cascade consistency pass for mission deletion. Volunteers hold weak
// references to missions (`applied_missions`, `history`) and nothing on the
// mission side tracks who references it, so deletion does a bulk corrective
// sweep over the volunteers collection.

use log::info;
use mongodb::bson::doc;
use mongodb::ClientSession;

use crate::db::MongoDB;
use crate::error::ApiError;
use crate::models::Volunteer;

/// Removes every volunteer-side reference to the mission. Runs inside the
/// caller's transaction, before the mission document itself is deleted; if
/// either sweep fails the caller aborts and the deletion as a whole fails.
pub async fn on_mission_deleted(
    db: &MongoDB,
    session: &mut ClientSession,
    mission_id: &str,
) -> Result<(), ApiError> {
    let volunteers = db.volunteers();

    let applications = volunteers
        .update_many(
            doc! { "applied_missions.mission_id": mission_id },
            doc! { "$pull": { "applied_missions": { "mission_id": mission_id } } },
        )
        .session(&mut *session)
        .await?;

    let history = volunteers
        .update_many(
            doc! { "history": mission_id },
            doc! { "$pull": { "history": mission_id } },
        )
        .session(&mut *session)
        .await?;

    info!(
        "Cascade delete: removed mission {} from {} application lists and {} histories",
        mission_id, applications.modified_count, history.modified_count
    );
    Ok(())
}

/// In-memory equivalent of the two `$pull` sweeps for a single volunteer
/// document. Returns whether anything was removed.
pub fn strip_mission(volunteer: &mut Volunteer, mission_id: &str) -> bool {
    let before = volunteer.applied_missions.len() + volunteer.history.len();
    volunteer
        .applied_missions
        .retain(|a| a.mission_id != mission_id);
    volunteer.history.retain(|m| m != mission_id);
    before != volunteer.applied_missions.len() + volunteer.history.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, MissionApplication};
    use chrono::Utc;

    fn volunteer_referencing(mission_ids: &[&str]) -> Volunteer {
        Volunteer {
            id: None,
            volunteer_id: "v1".to_string(),
            user_id: "u1".to_string(),
            first_name: "Amina".to_string(),
            last_name: "B".to_string(),
            phone: String::new(),
            bio: String::new(),
            wilaya: "Alger".to_string(),
            skills: vec![],
            interests: vec![],
            history: mission_ids.iter().map(|m| m.to_string()).collect(),
            applied_missions: mission_ids
                .iter()
                .map(|m| MissionApplication {
                    mission_id: m.to_string(),
                    status: ApplicationStatus::Accepted,
                    applied_at: Utc::now(),
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn strips_every_reference_to_the_mission() {
        let mut v = volunteer_referencing(&["m1", "m2"]);

        assert!(strip_mission(&mut v, "m1"));
        assert!(v.applied_missions.iter().all(|a| a.mission_id != "m1"));
        assert!(v.history.iter().all(|m| m != "m1"));
        // unrelated references survive
        assert_eq!(v.applied_missions.len(), 1);
        assert_eq!(v.history, vec!["m2".to_string()]);
    }

    #[test]
    fn stripping_an_unreferenced_mission_changes_nothing() {
        let mut v = volunteer_referencing(&["m2"]);
        assert!(!strip_mission(&mut v, "m1"));
        assert_eq!(v.applied_missions.len(), 1);
        assert_eq!(v.history.len(), 1);
    }
}
