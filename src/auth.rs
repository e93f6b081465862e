// src/auth.rs

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures_util::FutureExt;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db;
use crate::error::ApiError;
use crate::models::{Association, Role, User, Volunteer};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn create_jwt(user_id: &str, secret: &str) -> Result<String, ApiError> {
    let expiration = Utc::now() + Duration::days(30);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| {
        error!("Error signing token: {}", e);
        ApiError::Internal("Error signing token".to_string())
    })
}

/// Checks a bearer token against the configured secret and returns the
/// subject user id.
pub fn verify_token(token: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims.sub)
}

/// Authenticated user id, as stored in request extensions by the
/// Authentication middleware.
pub fn current_user(req: &HttpRequest) -> Result<String, ApiError> {
    req.extensions()
        .get::<String>()
        .cloned()
        .ok_or(ApiError::Unauthorized)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    // volunteer profile fields
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub wilaya: Option<String>,
    pub skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
    // association profile fields
    pub association_name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// POST /auth/register
/// Creates the user account and its role profile. The two inserts commit
/// together or not at all.
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let users = data.mongodb.users();

    if users
        .find_one(doc! { "email": &payload.email })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let hashed_password = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        error!("Error hashing password: {}", e);
        ApiError::Internal("Error hashing password".to_string())
    })?;

    let now = Utc::now();
    let new_user = User {
        id: None,
        user_id: Uuid::new_v4().to_string(),
        email: payload.email.clone(),
        password: hashed_password,
        role: payload.role,
        profile_photo: None,
        is_active: true,
        created_at: now,
    };

    let mut session = data.mongodb.client.start_session().await?;
    let mut ctx = (&data.mongodb, &payload, &new_user);
    db::run_transaction(&mut session, &mut ctx, |session, ctx| {
        let (mongodb, payload, new_user) = *ctx;
        async move {
            mongodb
                .users()
                .insert_one(new_user)
                .session(&mut *session)
                .await?;

            match payload.role {
                Role::Volunteer => {
                    let volunteer = Volunteer {
                        id: None,
                        volunteer_id: Uuid::new_v4().to_string(),
                        user_id: new_user.user_id.clone(),
                        first_name: payload.first_name.clone().unwrap_or_default(),
                        last_name: payload.last_name.clone().unwrap_or_default(),
                        phone: payload.phone.clone().unwrap_or_default(),
                        bio: payload.bio.clone().unwrap_or_default(),
                        wilaya: payload.wilaya.clone().unwrap_or_default(),
                        skills: payload.skills.clone().unwrap_or_default(),
                        interests: payload.interests.clone().unwrap_or_default(),
                        history: vec![],
                        applied_missions: vec![],
                        created_at: now,
                    };
                    mongodb
                        .volunteers()
                        .insert_one(&volunteer)
                        .session(&mut *session)
                        .await?;
                }
                Role::Association => {
                    let association = Association {
                        id: None,
                        association_id: Uuid::new_v4().to_string(),
                        user_id: new_user.user_id.clone(),
                        name: payload.association_name.clone().unwrap_or_default(),
                        email: payload.email.clone(),
                        phone: payload.phone.clone().unwrap_or_default(),
                        wilaya: payload.wilaya.clone().unwrap_or_default(),
                        address: payload.address.clone().unwrap_or_default(),
                        description: payload.description.clone().unwrap_or_default(),
                        logo: None,
                        website: payload.website.clone(),
                        category: payload.category.clone(),
                        created_at: now,
                    };
                    mongodb
                        .associations()
                        .insert_one(&association)
                        .session(&mut *session)
                        .await?;
                }
            }
            Ok(())
        }
        .boxed()
    })
    .await?;
    info!(
        "Registered {} account {}",
        payload.role.as_str(),
        new_user.user_id
    );

    let token = create_jwt(&new_user.user_id, &data.config.jwt_secret)?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": {
            "user": {
                "id": new_user.user_id,
                "email": new_user.email,
                "role": new_user.role,
            },
            "token": token,
        }
    })))
}

/// POST /auth/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = data
        .mongodb
        .users()
        .find_one(doc! { "email": &payload.email })
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify(&payload.password, &user.password).unwrap_or(false) {
        return Err(ApiError::Unauthorized);
    }
    // Logging in through the wrong account type is treated as bad credentials.
    if user.role != payload.role {
        return Err(ApiError::Unauthorized);
    }

    let token = create_jwt(&user.user_id, &data.config.jwt_secret)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "user": {
                "id": user.user_id,
                "email": user.email,
                "role": user.role,
            },
            "token": token,
        }
    })))
}

/// GET /auth/me
pub async fn me(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req)?;
    let user = data
        .mongodb
        .users()
        .find_one(doc! { "user_id": &user_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let profile = match user.role {
        Role::Volunteer => data
            .mongodb
            .volunteers()
            .find_one(doc! { "user_id": &user_id })
            .await?
            .map(|v| json!(v)),
        Role::Association => data
            .mongodb
            .associations()
            .find_one(doc! { "user_id": &user_id })
            .await?
            .map(|a| json!(a)),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "user": {
                "id": user.user_id,
                "email": user.email,
                "role": user.role,
                "profile_photo": user.profile_photo,
                "is_active": user.is_active,
            },
            "profile": profile,
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_the_subject_with_the_signing_secret() {
        let token = create_jwt("user-1", "signing-secret").unwrap();
        assert_eq!(verify_token(&token, "signing-secret").unwrap(), "user-1");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = create_jwt("user-1", "signing-secret").unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }
}
