// src/main.rs

mod app_state;
mod association;
mod auth;
mod cascade;
mod config;
mod db;
mod error;
mod lifecycle;
mod mission;
mod models;
mod recommend;
mod volunteer;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use log::info;
use serde_json::json;

use crate::app_state::AppState;
use crate::association::{
    get_association, get_dashboard, search_associations,
};
use crate::auth::{login, me, register, verify_token};
use crate::mission::{
    apply_to_mission, close_mission, create_mission, delete_mission, get_mission,
    get_missions_by_association, get_recommended_missions, handle_application, list_missions,
    update_mission, withdraw_application,
};
use crate::volunteer::{get_applications, get_history};

/// Bearer-token middleware. A valid token puts the subject user id into the
/// request extensions; handlers that need a caller read it from there.
/// Tokens are checked against the configured secret only; there is no
/// fallback secret.
#[derive(Debug)]
pub struct Authentication {
    jwt_secret: String,
}

impl Authentication {
    pub fn new(jwt_secret: &str) -> Self {
        Authentication {
            jwt_secret: jwt_secret.to_string(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            jwt_secret: self.jwt_secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    jwt_secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim().to_string();
                    match verify_token(&token, &self.jwt_secret) {
                        Ok(user_id) => {
                            req.extensions_mut().insert(user_id);
                        }
                        Err(e) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .json(json!({
                                    "success": false,
                                    "message": format!("Invalid token: {}", e),
                                }))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "OK", "message": "Server is running" }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config.mongo_uri, &config.database_name).await);
    mongodb
        .ensure_indexes()
        .await
        .expect("Failed to create indexes");

    let frontend_origin = config.frontend_origin.clone();
    let bind_addr = ("0.0.0.0", config.port);

    info!("Server running at http://{}:{}", bind_addr.0, bind_addr.1);
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(&config.jwt_secret))
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
                config: config.clone(),
            }))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/me", web::get().to(me)),
            )
            .service(
                web::scope("/missions")
                    .route("", web::get().to(list_missions))
                    .route("", web::post().to(create_mission))
                    .route("/recommended", web::get().to(get_recommended_missions))
                    .route(
                        "/association/{association_id}",
                        web::get().to(get_missions_by_association),
                    )
                    .route("/{mission_id}", web::get().to(get_mission))
                    .route("/{mission_id}", web::put().to(update_mission))
                    .route("/{mission_id}", web::delete().to(delete_mission))
                    .route("/{mission_id}/apply", web::post().to(apply_to_mission))
                    .route(
                        "/{mission_id}/withdraw",
                        web::delete().to(withdraw_application),
                    )
                    .route(
                        "/{mission_id}/applicants/{volunteer_id}",
                        web::put().to(handle_application),
                    )
                    .route("/{mission_id}/close", web::put().to(close_mission)),
            )
            .service(
                web::scope("/volunteers")
                    .route("/profile", web::get().to(volunteer::get_profile))
                    .route("/profile", web::put().to(volunteer::update_profile))
                    .route("/history", web::get().to(get_history))
                    .route("/applications", web::get().to(get_applications)),
            )
            .service(
                web::scope("/associations")
                    .route("/search", web::get().to(search_associations))
                    .route("/profile/me", web::get().to(association::get_profile))
                    .route("/profile/me", web::put().to(association::update_profile))
                    .route("/dashboard/stats", web::get().to(get_dashboard))
                    .route("/{association_id}", web::get().to(get_association)),
            )
            .route("/health", web::get().to(health))
    })
    .bind(bind_addr)?
    .run()
    .await
}
