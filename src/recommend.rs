// src/recommend.rs
//
// Recommendation scorer: pure, deterministic matching between a volunteer
// profile and open missions.

use std::cmp::Reverse;

use serde::Serialize;

use crate::models::{Mission, Volunteer};

/// Weight of a required skill the volunteer has.
pub const SKILL_WEIGHT: i32 = 2;
/// Weight of a shared interest.
pub const INTEREST_WEIGHT: i32 = 1;
/// Weight of a matching wilaya.
pub const WILAYA_WEIGHT: i32 = 1;

/// A mission paired with its match score for one volunteer.
#[derive(Debug, Serialize)]
pub struct ScoredMission {
    #[serde(flatten)]
    pub mission: Mission,
    pub recommendation_score: i32,
}

/// Additive overlap score between a mission's requirements and a volunteer's
/// profile. Skill matches weigh double; interests and location weigh one each.
pub fn score(mission: &Mission, volunteer: &Volunteer) -> i32 {
    let mut score = 0;

    for skill in &mission.required_skills {
        if volunteer.skills.contains(skill) {
            score += SKILL_WEIGHT;
        }
    }
    for interest in &mission.interests {
        if volunteer.interests.contains(interest) {
            score += INTEREST_WEIGHT;
        }
    }
    if mission.wilaya == volunteer.wilaya {
        score += WILAYA_WEIGHT;
    }

    score
}

/// Scores every candidate mission and orders them best-first. The sort is
/// stable, so equal scores keep the candidates' input order. Zero-score
/// missions are ranked, not filtered out.
pub fn rank(volunteer: &Volunteer, missions: Vec<Mission>) -> Vec<ScoredMission> {
    let mut scored: Vec<ScoredMission> = missions
        .into_iter()
        .map(|mission| {
            let recommendation_score = score(&mission, volunteer);
            ScoredMission {
                mission,
                recommendation_score,
            }
        })
        .collect();

    scored.sort_by_key(|s| Reverse(s.recommendation_score));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MissionStatus;
    use chrono::Utc;

    fn mission(id: &str, skills: &[&str], interests: &[&str], wilaya: &str) -> Mission {
        let now = Utc::now();
        Mission {
            id: None,
            mission_id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            wilaya: wilaya.to_string(),
            start_date: now,
            end_date: now,
            images: vec![],
            association_id: "assoc-1".to_string(),
            applicants: vec![],
            accepted_volunteers: vec![],
            max_volunteers: 0,
            status: MissionStatus::Open,
            created_at: now,
        }
    }

    fn volunteer(skills: &[&str], interests: &[&str], wilaya: &str) -> Volunteer {
        Volunteer {
            id: None,
            volunteer_id: "v1".to_string(),
            user_id: "u1".to_string(),
            first_name: "Amina".to_string(),
            last_name: "B".to_string(),
            phone: String::new(),
            bio: String::new(),
            wilaya: wilaya.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            history: vec![],
            applied_missions: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn weights_are_additive_and_independent() {
        let v = volunteer(&["Teaching"], &["Education"], "Alger");

        let base = mission("m", &[], &[], "Oran");
        assert_eq!(score(&base, &v), 0);

        let skill = mission("m", &["Teaching"], &[], "Oran");
        assert_eq!(score(&skill, &v), SKILL_WEIGHT);

        let interest = mission("m", &[], &["Education"], "Oran");
        assert_eq!(score(&interest, &v), INTEREST_WEIGHT);

        let location = mission("m", &[], &[], "Alger");
        assert_eq!(score(&location, &v), WILAYA_WEIGHT);

        let all = mission("m", &["Teaching"], &["Education"], "Alger");
        assert_eq!(all.required_skills.len(), 1);
        assert_eq!(
            score(&all, &v),
            SKILL_WEIGHT + INTEREST_WEIGHT + WILAYA_WEIGHT
        );
    }

    #[test]
    fn unmatched_requirements_do_not_count() {
        let v = volunteer(&["Teaching"], &["Education"], "Alger");
        let m = mission("m", &["Plumbing", "Teaching"], &["Sports"], "Oran");
        assert_eq!(score(&m, &v), SKILL_WEIGHT);
    }

    #[test]
    fn ranking_is_descending() {
        let v = volunteer(&["Teaching", "First Aid"], &["Education"], "Alger");
        let low = mission("low", &[], &["Education"], "Oran");
        let high = mission("high", &["Teaching", "First Aid"], &[], "Alger");
        let zero = mission("zero", &[], &[], "Oran");

        let ranked = rank(&v, vec![low, high, zero]);
        let order: Vec<&str> = ranked.iter().map(|s| s.mission.mission_id.as_str()).collect();
        assert_eq!(order, vec!["high", "low", "zero"]);
        assert_eq!(ranked[0].recommendation_score, 5);
        // zero-score missions stay in the ranking
        assert_eq!(ranked[2].recommendation_score, 0);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let v = volunteer(&["Teaching"], &["Education"], "Alger");
        // A: one skill match = 2; B: one interest + wilaya = 2
        let a = mission("A", &["Teaching"], &[], "Oran");
        let b = mission("B", &[], &["Education"], "Alger");

        let ranked = rank(&v, vec![a, b]);
        assert_eq!(ranked[0].recommendation_score, 2);
        assert_eq!(ranked[1].recommendation_score, 2);
        assert_eq!(ranked[0].mission.mission_id, "A");
        assert_eq!(ranked[1].mission.mission_id, "B");

        let ranked = rank(
            &v,
            vec![
                mission("B", &[], &["Education"], "Alger"),
                mission("A", &["Teaching"], &[], "Oran"),
            ],
        );
        assert_eq!(ranked[0].mission.mission_id, "B");
        assert_eq!(ranked[1].mission.mission_id, "A");
    }
}
