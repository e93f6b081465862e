// src/volunteer.rs

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use mongodb::bson::{doc, Document};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::db::MongoDB;
use crate::error::ApiError;
use crate::mission::{association_summaries, with_association};
use crate::models::{ApplicationStatus, Mission, Volunteer};

pub async fn volunteer_by_user(db: &MongoDB, user_id: &str) -> Result<Volunteer, ApiError> {
    db.volunteers()
        .find_one(doc! { "user_id": user_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Volunteer profile not found".to_string()))
}

pub async fn volunteer_by_id(db: &MongoDB, volunteer_id: &str) -> Result<Volunteer, ApiError> {
    db.volunteers()
        .find_one(doc! { "volunteer_id": volunteer_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Volunteer not found".to_string()))
}

/// Start of the current UTC day, the cutoff between running and finished
/// missions.
fn today_start() -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or_else(Utc::now)
}

async fn missions_by_ids(db: &MongoDB, ids: Vec<&str>) -> Result<Vec<Mission>, ApiError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let mut cursor = db
        .missions()
        .find(doc! { "mission_id": { "$in": ids } })
        .await?;
    let mut missions = Vec::new();
    while let Some(mission) = cursor.next().await {
        missions.push(mission?);
    }
    Ok(missions)
}

#[derive(Debug, Deserialize)]
pub struct UpdateVolunteerRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub wilaya: Option<String>,
    pub skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
}

/// GET /volunteers/profile
pub async fn get_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let volunteer = volunteer_by_user(&data.mongodb, &user_id).await?;
    let user = data
        .mongodb
        .users()
        .find_one(doc! { "user_id": &user_id })
        .await?;

    let mut value = json!(volunteer);
    if let Some(obj) = value.as_object_mut() {
        if let Some(user) = user {
            obj.insert("profile_photo".to_string(), json!(user.profile_photo));
            obj.insert("email".to_string(), json!(user.email));
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": value })))
}

/// PUT /volunteers/profile
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateVolunteerRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;

    let mut update_doc = Document::new();
    if let Some(first_name) = &payload.first_name {
        update_doc.insert("first_name", first_name);
    }
    if let Some(last_name) = &payload.last_name {
        update_doc.insert("last_name", last_name);
    }
    if let Some(phone) = &payload.phone {
        update_doc.insert("phone", phone);
    }
    if let Some(bio) = &payload.bio {
        update_doc.insert("bio", bio);
    }
    if let Some(wilaya) = &payload.wilaya {
        update_doc.insert("wilaya", wilaya);
    }
    if let Some(skills) = &payload.skills {
        update_doc.insert("skills", skills);
    }
    if let Some(interests) = &payload.interests {
        update_doc.insert("interests", interests);
    }

    if update_doc.is_empty() {
        return Err(ApiError::InvalidState("No fields to update".to_string()));
    }

    let result = data
        .mongodb
        .volunteers()
        .update_one(doc! { "user_id": &user_id }, doc! { "$set": update_doc })
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound(
            "Volunteer profile not found".to_string(),
        ));
    }

    let updated = volunteer_by_user(&data.mongodb, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": updated })))
}

/// GET /volunteers/history
/// Missions from the volunteer's history whose end date has passed.
pub async fn get_history(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let volunteer = volunteer_by_user(&data.mongodb, &user_id).await?;

    let ids: Vec<&str> = volunteer.history.iter().map(String::as_str).collect();
    let mut missions = missions_by_ids(&data.mongodb, ids).await?;

    let cutoff = today_start();
    missions.retain(|m| m.end_date < cutoff);

    let summaries = association_summaries(&data.mongodb, &missions).await?;
    let payload: Vec<Value> = missions
        .iter()
        .map(|m| with_association(m, &summaries))
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": payload })))
}

/// GET /volunteers/applications
/// Pending and accepted applications for missions that have not ended yet.
/// Applications whose mission vanished are skipped; the cascade pass keeps
/// those from existing in the first place.
pub async fn get_applications(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let volunteer = volunteer_by_user(&data.mongodb, &user_id).await?;

    let ids: Vec<&str> = volunteer
        .applied_missions
        .iter()
        .map(|a| a.mission_id.as_str())
        .collect();
    let missions = missions_by_ids(&data.mongodb, ids).await?;
    let summaries = association_summaries(&data.mongodb, &missions).await?;
    let by_id: HashMap<&str, &Mission> = missions
        .iter()
        .map(|m| (m.mission_id.as_str(), m))
        .collect();

    let cutoff = today_start();
    let applications: Vec<Value> = volunteer
        .applied_missions
        .iter()
        .filter(|a| {
            matches!(
                a.status,
                ApplicationStatus::Pending | ApplicationStatus::Accepted
            )
        })
        .filter_map(|a| {
            let mission = by_id.get(a.mission_id.as_str())?;
            if mission.end_date < cutoff {
                return None;
            }
            Some(json!({
                "mission": with_association(mission, &summaries),
                "status": a.status,
                "applied_at": a.applied_at,
            }))
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": applications })))
}
