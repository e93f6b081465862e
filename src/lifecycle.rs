// src/lifecycle.rs
//
// Application lifecycle state machine. Every mutation here touches a
// Mission/Volunteer pair in memory and keeps the two sides mirrored; the
// mission handlers run these transitions first and then persist both
// documents under a single transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{
    Applicant, ApplicantStatus, ApplicationStatus, Mission, MissionApplication, MissionStatus,
    Volunteer,
};

/// An association's ruling on a pending applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::Rejected => "rejected",
        }
    }

    fn applicant_status(&self) -> ApplicantStatus {
        match self {
            Decision::Accepted => ApplicantStatus::Accepted,
            Decision::Rejected => ApplicantStatus::Rejected,
        }
    }

    fn application_status(&self) -> ApplicationStatus {
        match self {
            Decision::Accepted => ApplicationStatus::Accepted,
            Decision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Records a pending application on both sides of the relation.
///
/// Fails with `InvalidState` unless the mission is open, and with `Conflict`
/// if either side already holds a record for the pair. Returns the two
/// appended records so the caller can issue the matching `$push` writes.
pub fn apply(
    mission: &mut Mission,
    volunteer: &mut Volunteer,
    now: DateTime<Utc>,
) -> Result<(Applicant, MissionApplication), ApiError> {
    if mission.status != MissionStatus::Open {
        return Err(ApiError::InvalidState(
            "Mission is not open for applications".to_string(),
        ));
    }

    let duplicate = mission.applicant(&volunteer.volunteer_id).is_some()
        || volunteer
            .applied_missions
            .iter()
            .any(|a| a.mission_id == mission.mission_id);
    if duplicate {
        return Err(ApiError::Conflict(
            "Already applied to this mission".to_string(),
        ));
    }

    let applicant = Applicant {
        volunteer_id: volunteer.volunteer_id.clone(),
        status: ApplicantStatus::Pending,
        applied_at: now,
    };
    let application = MissionApplication {
        mission_id: mission.mission_id.clone(),
        status: ApplicationStatus::Pending,
        applied_at: now,
    };

    mission.applicants.push(applicant.clone());
    volunteer.applied_missions.push(application.clone());
    Ok((applicant, application))
}

/// Removes the pair's application records from both sides. Filtering an
/// absent id changes nothing, so withdrawing twice is a harmless no-op.
pub fn withdraw(mission: &mut Mission, volunteer: &mut Volunteer) {
    mission
        .applicants
        .retain(|a| a.volunteer_id != volunteer.volunteer_id);
    volunteer
        .applied_missions
        .retain(|a| a.mission_id != mission.mission_id);
}

/// Applies an accept/reject ruling to an applicant and mirrors it onto the
/// volunteer's application record.
///
/// Re-deciding with the same value is an idempotent no-op (`Ok(false)`);
/// re-deciding with a different value is `Conflict`, which keeps
/// `accepted_volunteers` consistent with the accepted applicants.
pub fn decide(
    mission: &mut Mission,
    volunteer: &mut Volunteer,
    decision: Decision,
) -> Result<bool, ApiError> {
    let target = decision.applicant_status();
    let applicant = mission
        .applicants
        .iter_mut()
        .find(|a| a.volunteer_id == volunteer.volunteer_id)
        .ok_or_else(|| ApiError::NotFound("Applicant not found".to_string()))?;

    if applicant.status == target {
        return Ok(false);
    }
    if applicant.status != ApplicantStatus::Pending {
        return Err(ApiError::Conflict(
            "Application has already been decided".to_string(),
        ));
    }

    applicant.status = target;
    if decision == Decision::Accepted
        && !mission
            .accepted_volunteers
            .contains(&volunteer.volunteer_id)
    {
        mission
            .accepted_volunteers
            .push(volunteer.volunteer_id.clone());
    }

    if let Some(application) = volunteer
        .applied_missions
        .iter_mut()
        .find(|a| a.mission_id == mission.mission_id)
    {
        application.status = decision.application_status();
    }

    Ok(true)
}

/// Transitions an open mission to closed. The transition is one-way; there
/// is no reopening.
pub fn close(mission: &mut Mission) -> Result<(), ApiError> {
    if mission.status != MissionStatus::Open {
        return Err(ApiError::InvalidState(
            "Mission is already closed".to_string(),
        ));
    }
    mission.status = MissionStatus::Closed;
    Ok(())
}

/// Appends a closed mission to a volunteer's history unless already present.
/// Returns whether anything was appended.
pub fn record_history(mission_id: &str, volunteer: &mut Volunteer) -> bool {
    if volunteer.history.iter().any(|m| m == mission_id) {
        return false;
    }
    volunteer.history.push(mission_id.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mission(id: &str) -> Mission {
        let now = Utc::now();
        Mission {
            id: None,
            mission_id: id.to_string(),
            title: "Beach cleanup".to_string(),
            description: "Cleaning up the coastline".to_string(),
            required_skills: vec![],
            interests: vec![],
            wilaya: "Alger".to_string(),
            start_date: now,
            end_date: now,
            images: vec![],
            association_id: "assoc-1".to_string(),
            applicants: vec![],
            accepted_volunteers: vec![],
            max_volunteers: 1,
            status: MissionStatus::Open,
            created_at: now,
        }
    }

    fn volunteer(id: &str) -> Volunteer {
        Volunteer {
            id: None,
            volunteer_id: id.to_string(),
            user_id: format!("user-{}", id),
            first_name: "Amina".to_string(),
            last_name: "B".to_string(),
            phone: String::new(),
            bio: String::new(),
            wilaya: "Alger".to_string(),
            skills: vec![],
            interests: vec![],
            history: vec![],
            applied_missions: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn apply_mirrors_records_on_both_sides() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");
        let now = Utc::now();

        let (applicant, application) = apply(&mut m, &mut v, now).unwrap();
        assert_eq!(applicant.volunteer_id, "v1");
        assert_eq!(application.mission_id, "m1");
        assert_eq!(applicant.applied_at, application.applied_at);
        assert_eq!(m.applicants.len(), 1);
        assert_eq!(v.applied_missions.len(), 1);
        assert_eq!(m.applicants[0].status, ApplicantStatus::Pending);
        assert_eq!(v.applied_missions[0].status, ApplicationStatus::Pending);
    }

    #[test]
    fn second_apply_is_a_conflict_and_leaves_one_entry() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");

        apply(&mut m, &mut v, Utc::now()).unwrap();
        let err = apply(&mut m, &mut v, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(m.applicants.len(), 1);
        assert_eq!(v.applied_missions.len(), 1);
    }

    #[test]
    fn apply_with_a_one_sided_volunteer_record_is_a_conflict() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");
        v.applied_missions.push(MissionApplication {
            mission_id: "m1".to_string(),
            status: ApplicationStatus::Pending,
            applied_at: Utc::now(),
        });

        let err = apply(&mut m, &mut v, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert!(m.applicants.is_empty());
        assert_eq!(v.applied_missions.len(), 1);
    }

    #[test]
    fn apply_to_closed_mission_is_invalid_and_leaves_state_untouched() {
        let mut m = mission("m1");
        m.status = MissionStatus::Closed;
        let mut v = volunteer("v1");

        let err = apply(&mut m, &mut v, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        assert!(m.applicants.is_empty());
        assert!(v.applied_missions.is_empty());
    }

    #[test]
    fn withdraw_removes_both_sides() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");
        apply(&mut m, &mut v, Utc::now()).unwrap();

        withdraw(&mut m, &mut v);
        assert!(m.applicants.is_empty());
        assert!(v.applied_missions.is_empty());
    }

    #[test]
    fn withdraw_without_application_is_a_noop() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");
        let mut other = volunteer("v2");
        apply(&mut m, &mut other, Utc::now()).unwrap();

        withdraw(&mut m, &mut v);
        assert_eq!(m.applicants.len(), 1);
        assert_eq!(m.applicants[0].volunteer_id, "v2");
    }

    #[test]
    fn accepting_updates_both_sides_and_the_accepted_set() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");
        apply(&mut m, &mut v, Utc::now()).unwrap();

        assert!(decide(&mut m, &mut v, Decision::Accepted).unwrap());
        assert_eq!(m.applicants[0].status, ApplicantStatus::Accepted);
        assert_eq!(v.applied_missions[0].status, ApplicationStatus::Accepted);
        assert_eq!(m.accepted_volunteers, vec!["v1".to_string()]);
    }

    #[test]
    fn repeated_accept_is_idempotent() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");
        apply(&mut m, &mut v, Utc::now()).unwrap();

        assert!(decide(&mut m, &mut v, Decision::Accepted).unwrap());
        assert!(!decide(&mut m, &mut v, Decision::Accepted).unwrap());
        assert_eq!(m.accepted_volunteers.len(), 1);
    }

    #[test]
    fn flipping_a_decision_is_a_conflict() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");
        apply(&mut m, &mut v, Utc::now()).unwrap();
        decide(&mut m, &mut v, Decision::Accepted).unwrap();

        let err = decide(&mut m, &mut v, Decision::Rejected).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(m.applicants[0].status, ApplicantStatus::Accepted);
        assert_eq!(m.accepted_volunteers, vec!["v1".to_string()]);
    }

    #[test]
    fn deciding_an_unknown_applicant_is_not_found() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");

        let err = decide(&mut m, &mut v, Decision::Rejected).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn close_is_one_way() {
        let mut m = mission("m1");
        close(&mut m).unwrap();
        assert_eq!(m.status, MissionStatus::Closed);

        let err = close(&mut m).unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[test]
    fn history_is_recorded_exactly_once() {
        let mut v = volunteer("v1");
        assert!(record_history("m1", &mut v));
        assert!(!record_history("m1", &mut v));
        assert_eq!(v.history, vec!["m1".to_string()]);
    }

    #[test]
    fn close_records_history_for_every_acceptance_present_at_close_time() {
        let mut m = mission("m1");
        let mut v1 = volunteer("v1");
        let mut v2 = volunteer("v2");
        apply(&mut m, &mut v1, Utc::now()).unwrap();
        apply(&mut m, &mut v2, Utc::now()).unwrap();
        decide(&mut m, &mut v1, Decision::Accepted).unwrap();

        // A second acceptance lands after the association already fetched
        // the mission to close it; the close must still see it.
        decide(&mut m, &mut v2, Decision::Accepted).unwrap();
        close(&mut m).unwrap();

        assert_eq!(
            m.accepted_volunteers,
            vec!["v1".to_string(), "v2".to_string()]
        );
        for volunteer_id in m.accepted_volunteers.clone() {
            let v = if volunteer_id == "v1" { &mut v1 } else { &mut v2 };
            assert!(record_history(&m.mission_id, v));
        }
        assert_eq!(v1.history, vec!["m1".to_string()]);
        assert_eq!(v2.history, vec!["m1".to_string()]);
    }

    #[test]
    fn apply_accept_close_end_to_end() {
        let mut m = mission("m1");
        let mut v = volunteer("v1");

        apply(&mut m, &mut v, Utc::now()).unwrap();
        decide(&mut m, &mut v, Decision::Accepted).unwrap();
        close(&mut m).unwrap();
        for volunteer_id in m.accepted_volunteers.clone() {
            assert_eq!(volunteer_id, v.volunteer_id);
            record_history(&m.mission_id, &mut v);
        }

        assert_eq!(m.status, MissionStatus::Closed);
        assert_eq!(v.history, vec!["m1".to_string()]);
        assert_eq!(v.applied_missions[0].status, ApplicationStatus::Accepted);
    }
}
