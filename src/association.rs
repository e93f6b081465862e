// src/association.rs

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use mongodb::bson::{doc, Document};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::db::MongoDB;
use crate::error::ApiError;
use crate::models::{Association, Mission, MissionStatus};

pub async fn association_by_user(db: &MongoDB, user_id: &str) -> Result<Association, ApiError> {
    db.associations()
        .find_one(doc! { "user_id": user_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Association profile not found".to_string()))
}

async fn missions_of(db: &MongoDB, filter: Document) -> Result<Vec<Mission>, ApiError> {
    let mut cursor = db.missions().find(filter).await?;
    let mut missions = Vec::new();
    while let Some(mission) = cursor.next().await {
        missions.push(mission?);
    }
    Ok(missions)
}

#[derive(Debug, Deserialize)]
pub struct AssociationQuery {
    pub name: Option<String>,
    pub wilaya: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssociationRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub wilaya: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
}

/// GET /associations/search
/// Public directory search; every hit carries its open-mission count.
pub async fn search_associations(
    data: web::Data<AppState>,
    query: web::Query<AssociationQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut filter = Document::new();
    if let Some(name) = &query.name {
        filter.insert("name", doc! { "$regex": name, "$options": "i" });
    }
    if let Some(wilaya) = &query.wilaya {
        filter.insert("wilaya", wilaya);
    }
    if let Some(category) = &query.category {
        filter.insert("category", category);
    }

    let mut cursor = data.mongodb.associations().find(filter).await?;
    let mut results: Vec<Value> = Vec::new();
    while let Some(association) = cursor.next().await {
        let association = association?;
        let mission_count = data
            .mongodb
            .missions()
            .count_documents(doc! {
                "association_id": &association.association_id,
                "status": MissionStatus::Open.as_str(),
            })
            .await?;

        let mut value = json!(association);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("mission_count".to_string(), json!(mission_count));
        }
        results.push(value);
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": results.len(),
        "data": results,
    })))
}

/// GET /associations/{id}
pub async fn get_association(
    data: web::Data<AppState>,
    association_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let association = data
        .mongodb
        .associations()
        .find_one(doc! { "association_id": &*association_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Association not found".to_string()))?;

    let missions = missions_of(
        &data.mongodb,
        doc! { "association_id": &association.association_id, "status": MissionStatus::Open.as_str() },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "association": association,
            "missions": missions,
        }
    })))
}

/// GET /associations/profile/me
pub async fn get_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let association = association_by_user(&data.mongodb, &user_id).await?;

    let missions = missions_of(
        &data.mongodb,
        doc! { "association_id": &association.association_id },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "association": association,
            "missions": missions,
        }
    })))
}

/// PUT /associations/profile/me
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateAssociationRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;

    let mut update_doc = Document::new();
    if let Some(name) = &payload.name {
        update_doc.insert("name", name);
    }
    if let Some(email) = &payload.email {
        update_doc.insert("email", email);
    }
    if let Some(phone) = &payload.phone {
        update_doc.insert("phone", phone);
    }
    if let Some(wilaya) = &payload.wilaya {
        update_doc.insert("wilaya", wilaya);
    }
    if let Some(address) = &payload.address {
        update_doc.insert("address", address);
    }
    if let Some(description) = &payload.description {
        update_doc.insert("description", description);
    }
    if let Some(website) = &payload.website {
        update_doc.insert("website", website);
    }
    if let Some(category) = &payload.category {
        update_doc.insert("category", category);
    }

    if update_doc.is_empty() {
        return Err(ApiError::InvalidState("No fields to update".to_string()));
    }

    let result = data
        .mongodb
        .associations()
        .update_one(doc! { "user_id": &user_id }, doc! { "$set": update_doc })
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound(
            "Association profile not found".to_string(),
        ));
    }

    let updated = association_by_user(&data.mongodb, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": updated })))
}

/// GET /associations/dashboard/stats
pub async fn get_dashboard(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let association = association_by_user(&data.mongodb, &user_id).await?;

    let missions = missions_of(
        &data.mongodb,
        doc! { "association_id": &association.association_id },
    )
    .await?;

    let total_missions = missions.len();
    let active_missions = missions
        .iter()
        .filter(|m| m.status == MissionStatus::Open)
        .count();
    let completed_missions = missions
        .iter()
        .filter(|m| m.status == MissionStatus::Completed)
        .count();
    let total_applicants: usize = missions.iter().map(|m| m.applicants.len()).sum();
    let total_accepted: usize = missions.iter().map(|m| m.accepted_volunteers.len()).sum();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "total_missions": total_missions,
            "active_missions": active_missions,
            "completed_missions": completed_missions,
            "total_applicants": total_applicants,
            "total_accepted": total_accepted,
        }
    })))
}
