// src/mission.rs

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::{FutureExt, StreamExt};
use log::info;
use mongodb::bson::{doc, to_bson, Document};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::association::association_by_user;
use crate::auth::current_user;
use crate::cascade;
use crate::db::{self, MongoDB};
use crate::error::ApiError;
use crate::lifecycle::{self, Decision};
use crate::models::{Association, Mission, MissionStatus, Volunteer};
use crate::recommend;
use crate::volunteer::{volunteer_by_id, volunteer_by_user};

#[derive(Debug, Deserialize)]
pub struct CreateMissionRequest {
    pub title: String,
    pub description: String,
    pub required_skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
    pub wilaya: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub images: Option<Vec<String>>,
    pub max_volunteers: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMissionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub required_skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
    pub wilaya: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub images: Option<Vec<String>>,
    pub max_volunteers: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MissionQuery {
    pub wilaya: Option<String>,
    /// YYYY-MM-DD; keeps missions whose date range contains this day.
    pub date: Option<NaiveDate>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub status: Decision,
}

pub async fn mission_by_id(db: &MongoDB, mission_id: &str) -> Result<Mission, ApiError> {
    db.missions()
        .find_one(doc! { "mission_id": mission_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Mission not found".to_string()))
}

fn ensure_owner(mission: &Mission, association: &Association) -> Result<(), ApiError> {
    if mission.association_id != association.association_id {
        return Err(ApiError::Forbidden("Not authorized".to_string()));
    }
    Ok(())
}

async fn drain(
    mut cursor: mongodb::Cursor<Mission>,
) -> Result<Vec<Mission>, ApiError> {
    let mut missions = Vec::new();
    while let Some(mission) = cursor.next().await {
        missions.push(mission?);
    }
    Ok(missions)
}

/// Name/logo summaries for the associations owning the given missions, used
/// to enrich listing payloads.
pub(crate) async fn association_summaries(
    db: &MongoDB,
    missions: &[Mission],
) -> Result<HashMap<String, Value>, ApiError> {
    let ids: Vec<&str> = missions.iter().map(|m| m.association_id.as_str()).collect();
    let mut cursor = db
        .associations()
        .find(doc! { "association_id": { "$in": ids } })
        .await?;

    let mut summaries = HashMap::new();
    while let Some(association) = cursor.next().await {
        let association = association?;
        summaries.insert(
            association.association_id.clone(),
            json!({
                "association_id": association.association_id,
                "name": association.name,
                "logo": association.logo,
            }),
        );
    }
    Ok(summaries)
}

pub(crate) fn with_association(mission: &Mission, summaries: &HashMap<String, Value>) -> Value {
    let mut value = json!(mission);
    if let Some(obj) = value.as_object_mut() {
        if let Some(summary) = summaries.get(&mission.association_id) {
            obj.insert("association".to_string(), summary.clone());
        }
    }
    value
}

/// POST /missions
pub async fn create_mission(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateMissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let association = association_by_user(&data.mongodb, &user_id).await?;

    if payload.end_date < payload.start_date {
        return Err(ApiError::InvalidState(
            "End date must not precede start date".to_string(),
        ));
    }

    let new_mission = Mission {
        id: None,
        mission_id: Uuid::new_v4().to_string(),
        title: payload.title.clone(),
        description: payload.description.clone(),
        required_skills: payload.required_skills.clone().unwrap_or_default(),
        interests: payload.interests.clone().unwrap_or_default(),
        wilaya: payload.wilaya.clone(),
        start_date: payload.start_date,
        end_date: payload.end_date,
        images: payload.images.clone().unwrap_or_default(),
        association_id: association.association_id.clone(),
        applicants: vec![],
        accepted_volunteers: vec![],
        max_volunteers: payload.max_volunteers.unwrap_or(0),
        status: MissionStatus::Open,
        created_at: Utc::now(),
    };

    data.mongodb.missions().insert_one(&new_mission).await?;
    info!("Mission created: {}", new_mission.mission_id);

    Ok(HttpResponse::Created().json(json!({ "success": true, "data": new_mission })))
}

/// GET /missions
/// Public listing of open missions with optional wilaya/date/text filters.
pub async fn list_missions(
    data: web::Data<AppState>,
    query: web::Query<MissionQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut filter = doc! { "status": MissionStatus::Open.as_str() };
    if let Some(wilaya) = &query.wilaya {
        filter.insert("wilaya", wilaya);
    }
    if let Some(search) = &query.search {
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": search, "$options": "i" } },
                doc! { "description": { "$regex": search, "$options": "i" } },
            ],
        );
    }

    let cursor = data
        .mongodb
        .missions()
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?;
    let mut missions = drain(cursor).await?;

    // Date containment is checked on the deserialized values rather than in
    // the query, where the timestamps are plain strings.
    if let Some(date) = query.date {
        let day = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
        if let Some(day) = day {
            missions.retain(|m| m.start_date <= day && m.end_date >= day);
        }
    }

    let summaries = association_summaries(&data.mongodb, &missions).await?;
    let payload: Vec<Value> = missions
        .iter()
        .map(|m| with_association(m, &summaries))
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": payload.len(),
        "data": payload,
    })))
}

/// GET /missions/recommended
/// Open missions ranked for the authenticated volunteer.
pub async fn get_recommended_missions(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let volunteer = volunteer_by_user(&data.mongodb, &user_id).await?;

    let cursor = data
        .mongodb
        .missions()
        .find(doc! { "status": MissionStatus::Open.as_str() })
        .await?;
    let missions = drain(cursor).await?;

    let ranked = recommend::rank(&volunteer, missions);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": ranked })))
}

/// GET /missions/association/{id}
pub async fn get_missions_by_association(
    data: web::Data<AppState>,
    association_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let cursor = data
        .mongodb
        .missions()
        .find(doc! { "association_id": &*association_id })
        .sort(doc! { "created_at": -1 })
        .await?;
    let missions = drain(cursor).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": missions.len(),
        "data": missions,
    })))
}

/// GET /missions/{id}
/// Mission detail with the owning association and applicant profiles joined
/// in, so associations can review who applied.
pub async fn get_mission(
    data: web::Data<AppState>,
    mission_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let mission = mission_by_id(&data.mongodb, &mission_id).await?;

    let association = data
        .mongodb
        .associations()
        .find_one(doc! { "association_id": &mission.association_id })
        .await?;

    let applicant_ids: Vec<&str> = mission
        .applicants
        .iter()
        .map(|a| a.volunteer_id.as_str())
        .collect();
    let mut volunteers: HashMap<String, Volunteer> = HashMap::new();
    if !applicant_ids.is_empty() {
        let mut cursor = data
            .mongodb
            .volunteers()
            .find(doc! { "volunteer_id": { "$in": applicant_ids } })
            .await?;
        while let Some(volunteer) = cursor.next().await {
            let volunteer = volunteer?;
            volunteers.insert(volunteer.volunteer_id.clone(), volunteer);
        }
    }

    let applicants: Vec<Value> = mission
        .applicants
        .iter()
        .map(|a| {
            json!({
                "volunteer_id": a.volunteer_id,
                "status": a.status,
                "applied_at": a.applied_at,
                "volunteer": volunteers.get(&a.volunteer_id),
            })
        })
        .collect();

    let mut value = json!(mission);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("applicants".to_string(), json!(applicants));
        if let Some(association) = association {
            obj.insert(
                "association".to_string(),
                json!({
                    "association_id": association.association_id,
                    "name": association.name,
                    "email": association.email,
                    "phone": association.phone,
                    "wilaya": association.wilaya,
                    "address": association.address,
                    "description": association.description,
                    "website": association.website,
                    "logo": association.logo,
                }),
            );
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": value })))
}

/// PUT /missions/{id}
pub async fn update_mission(
    req: HttpRequest,
    data: web::Data<AppState>,
    mission_id: web::Path<String>,
    payload: web::Json<UpdateMissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let mission = mission_by_id(&data.mongodb, &mission_id).await?;
    let association = association_by_user(&data.mongodb, &user_id).await?;
    ensure_owner(&mission, &association)?;

    let start = payload.start_date.unwrap_or(mission.start_date);
    let end = payload.end_date.unwrap_or(mission.end_date);
    if end < start {
        return Err(ApiError::InvalidState(
            "End date must not precede start date".to_string(),
        ));
    }

    let mut update_doc = Document::new();
    if let Some(title) = &payload.title {
        update_doc.insert("title", title);
    }
    if let Some(description) = &payload.description {
        update_doc.insert("description", description);
    }
    if let Some(required_skills) = &payload.required_skills {
        update_doc.insert("required_skills", required_skills);
    }
    if let Some(interests) = &payload.interests {
        update_doc.insert("interests", interests);
    }
    if let Some(wilaya) = &payload.wilaya {
        update_doc.insert("wilaya", wilaya);
    }
    if let Some(start_date) = &payload.start_date {
        update_doc.insert("start_date", to_bson(start_date)?);
    }
    if let Some(end_date) = &payload.end_date {
        update_doc.insert("end_date", to_bson(end_date)?);
    }
    if let Some(images) = &payload.images {
        update_doc.insert("images", images);
    }
    if let Some(max_volunteers) = payload.max_volunteers {
        update_doc.insert("max_volunteers", max_volunteers);
    }

    if update_doc.is_empty() {
        return Err(ApiError::InvalidState("No fields to update".to_string()));
    }

    data.mongodb
        .missions()
        .update_one(
            doc! { "mission_id": &*mission_id },
            doc! { "$set": update_doc },
        )
        .await?;

    let updated = mission_by_id(&data.mongodb, &mission_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": updated })))
}

/// DELETE /missions/{id}
/// Deletes the mission and sweeps every volunteer-side reference to it in
/// the same transaction; a failed sweep fails the whole deletion.
pub async fn delete_mission(
    req: HttpRequest,
    data: web::Data<AppState>,
    mission_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let mission = mission_by_id(&data.mongodb, &mission_id).await?;
    let association = association_by_user(&data.mongodb, &user_id).await?;
    ensure_owner(&mission, &association)?;

    let mut session = data.mongodb.client.start_session().await?;
    let mut ctx = (&data.mongodb, &mission.mission_id);
    db::run_transaction(&mut session, &mut ctx, |session, ctx| {
        let (mongodb, mission_id) = *ctx;
        async move {
            cascade::on_mission_deleted(mongodb, &mut *session, mission_id).await?;
            mongodb
                .missions()
                .delete_one(doc! { "mission_id": mission_id })
                .session(&mut *session)
                .await?;
            Ok(())
        }
        .boxed()
    })
    .await?;
    info!("Mission deleted: {}", mission.mission_id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {},
        "message": "Mission and all related data deleted successfully",
    })))
}

/// POST /missions/{id}/apply
pub async fn apply_to_mission(
    req: HttpRequest,
    data: web::Data<AppState>,
    mission_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let mut mission = mission_by_id(&data.mongodb, &mission_id).await?;
    let mut volunteer = volunteer_by_user(&data.mongodb, &user_id).await?;

    let (applicant, application) = lifecycle::apply(&mut mission, &mut volunteer, Utc::now())?;

    let mut session = data.mongodb.client.start_session().await?;
    let mut ctx = (&data.mongodb, &mission, &volunteer, &applicant, &application);
    db::run_transaction(&mut session, &mut ctx, |session, ctx| {
        let (mongodb, mission, volunteer, applicant, application) = *ctx;
        async move {
            // The filter re-checks openness and uniqueness inside the
            // transaction, so of two concurrent applies for the same pair
            // exactly one commits and the loser sees Conflict, whether it
            // lost here or in a transient rerun.
            let guarded = mongodb
                .missions()
                .update_one(
                    doc! {
                        "mission_id": &mission.mission_id,
                        "status": MissionStatus::Open.as_str(),
                        "applicants.volunteer_id": { "$ne": &volunteer.volunteer_id },
                    },
                    doc! { "$push": { "applicants": to_bson(applicant)? } },
                )
                .session(&mut *session)
                .await?;
            if guarded.modified_count == 0 {
                return Err(ApiError::Conflict(
                    "Already applied to this mission".to_string(),
                ));
            }

            let mirrored = mongodb
                .volunteers()
                .update_one(
                    doc! {
                        "volunteer_id": &volunteer.volunteer_id,
                        "applied_missions.mission_id": { "$ne": &mission.mission_id },
                    },
                    doc! { "$push": { "applied_missions": to_bson(application)? } },
                )
                .session(&mut *session)
                .await?;
            // A one-sided record means the two collections are out of sync;
            // refuse to widen the gap.
            if mirrored.modified_count == 0 {
                return Err(ApiError::Internal(
                    "Application records are out of sync".to_string(),
                ));
            }
            Ok(())
        }
        .boxed()
    })
    .await?;
    info!(
        "Volunteer {} applied to mission {}",
        volunteer.volunteer_id, mission.mission_id
    );

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": mission })))
}

/// DELETE /missions/{id}/withdraw
/// Withdrawing an application that does not exist is a harmless no-op.
pub async fn withdraw_application(
    req: HttpRequest,
    data: web::Data<AppState>,
    mission_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let mut mission = mission_by_id(&data.mongodb, &mission_id).await?;
    let mut volunteer = volunteer_by_user(&data.mongodb, &user_id).await?;

    lifecycle::withdraw(&mut mission, &mut volunteer);

    let mut session = data.mongodb.client.start_session().await?;
    let mut ctx = (&data.mongodb, &mission, &volunteer);
    db::run_transaction(&mut session, &mut ctx, |session, ctx| {
        let (mongodb, mission, volunteer) = *ctx;
        async move {
            mongodb
                .missions()
                .update_one(
                    doc! { "mission_id": &mission.mission_id },
                    doc! { "$pull": { "applicants": { "volunteer_id": &volunteer.volunteer_id } } },
                )
                .session(&mut *session)
                .await?;
            mongodb
                .volunteers()
                .update_one(
                    doc! { "volunteer_id": &volunteer.volunteer_id },
                    doc! { "$pull": { "applied_missions": { "mission_id": &mission.mission_id } } },
                )
                .session(&mut *session)
                .await?;
            Ok(())
        }
        .boxed()
    })
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": {} })))
}

/// PUT /missions/{id}/applicants/{volunteer_id}
/// Accept or reject an applicant, mirroring the status onto the volunteer's
/// application record.
pub async fn handle_application(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<DecisionRequest>,
) -> Result<HttpResponse, ApiError> {
    let (mission_id, volunteer_id) = path.into_inner();
    let user_id = current_user(&req)?;
    let mut mission = mission_by_id(&data.mongodb, &mission_id).await?;
    let association = association_by_user(&data.mongodb, &user_id).await?;
    ensure_owner(&mission, &association)?;

    if mission.applicant(&volunteer_id).is_none() {
        return Err(ApiError::NotFound("Applicant not found".to_string()));
    }
    let mut volunteer = volunteer_by_id(&data.mongodb, &volunteer_id).await?;

    let decision = payload.status;
    let changed = lifecycle::decide(&mut mission, &mut volunteer, decision)?;

    if changed {
        let mut session = data.mongodb.client.start_session().await?;
        let mut ctx = (&data.mongodb, &mission, &volunteer);
        db::run_transaction(&mut session, &mut ctx, |session, ctx| {
            let (mongodb, mission, volunteer) = *ctx;
            async move {
                let mut update = doc! { "$set": { "applicants.$.status": decision.as_str() } };
                if decision == Decision::Accepted {
                    update.insert(
                        "$addToSet",
                        doc! { "accepted_volunteers": &volunteer.volunteer_id },
                    );
                }
                mongodb
                    .missions()
                    .update_one(
                        doc! {
                            "mission_id": &mission.mission_id,
                            "applicants.volunteer_id": &volunteer.volunteer_id,
                        },
                        update,
                    )
                    .session(&mut *session)
                    .await?;

                mongodb
                    .volunteers()
                    .update_one(
                        doc! {
                            "volunteer_id": &volunteer.volunteer_id,
                            "applied_missions.mission_id": &mission.mission_id,
                        },
                        doc! { "$set": { "applied_missions.$.status": decision.as_str() } },
                    )
                    .session(&mut *session)
                    .await?;
                Ok(())
            }
            .boxed()
        })
        .await?;
        info!(
            "Applicant {} {} on mission {}",
            volunteer.volunteer_id,
            decision.as_str(),
            mission.mission_id
        );
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": mission })))
}

/// PUT /missions/{id}/close
/// Closes the mission and appends it to each accepted volunteer's history
/// exactly once.
pub async fn close_mission(
    req: HttpRequest,
    data: web::Data<AppState>,
    mission_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let mut mission = mission_by_id(&data.mongodb, &mission_id).await?;
    let association = association_by_user(&data.mongodb, &user_id).await?;
    ensure_owner(&mission, &association)?;

    lifecycle::close(&mut mission)?;

    let mut session = data.mongodb.client.start_session().await?;
    let mut ctx = (&data.mongodb, &mission.mission_id);
    let mission = db::run_transaction(&mut session, &mut ctx, |session, ctx| {
        let (mongodb, mission_id) = *ctx;
        async move {
            let closed = mongodb
                .missions()
                .update_one(
                    doc! { "mission_id": mission_id, "status": MissionStatus::Open.as_str() },
                    doc! { "$set": { "status": MissionStatus::Closed.as_str() } },
                )
                .session(&mut *session)
                .await?;
            if closed.modified_count == 0 {
                return Err(ApiError::InvalidState(
                    "Mission is already closed".to_string(),
                ));
            }

            // Re-read inside the transaction. The accepted set may have
            // grown since the handler's first read, and once the mission is
            // closed there is no second chance to record history.
            let current = mongodb
                .missions()
                .find_one(doc! { "mission_id": mission_id })
                .session(&mut *session)
                .await?
                .ok_or_else(|| ApiError::NotFound("Mission not found".to_string()))?;

            for volunteer_id in &current.accepted_volunteers {
                let found = mongodb
                    .volunteers()
                    .find_one(doc! { "volunteer_id": volunteer_id })
                    .session(&mut *session)
                    .await?;
                // Volunteers deleted since acceptance are skipped.
                if let Some(mut volunteer) = found {
                    if lifecycle::record_history(&current.mission_id, &mut volunteer) {
                        mongodb
                            .volunteers()
                            .update_one(
                                doc! { "volunteer_id": volunteer_id },
                                doc! { "$addToSet": { "history": &current.mission_id } },
                            )
                            .session(&mut *session)
                            .await?;
                    }
                }
            }
            Ok(current)
        }
        .boxed()
    })
    .await?;
    info!("Mission closed: {}", mission.mission_id);

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": mission })))
}
