// src/main.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix::Actor;
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

use codecollab::ai::generate_endpoint;
use codecollab::app_state::AppState;
use codecollab::auth::{login, profile, register, validate_jwt};
use codecollab::chat_server::ChatServer;
use codecollab::config::Config;
use codecollab::db::MongoDB;
use codecollab::git::import_repo;
use codecollab::project::{add_user, check_project, create_project, list_projects};
use codecollab::ws::ws_index;

#[derive(Debug)]
pub struct Authentication {
    jwt_secret: String,
}

impl Authentication {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Authentication {
            jwt_secret: jwt_secret.into(),
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
        // Cookie first, then "Bearer <token>" from the Authorization header.
        let token = req
            .request()
            .cookie("token")
            .map(|c| c.value().to_string())
            .or_else(|| {
                req.headers()
                    .get(http::header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| value.starts_with("Bearer "))
                    .map(|value| value.trim_start_matches("Bearer ").trim().to_string())
            });

        if let Some(token) = token {
            match validate_jwt(&token, &self.jwt_secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims.sub);
                }
                Err(e) => {
                    let (req_parts, _payload) = req.into_parts();
                    let resp = HttpResponse::Unauthorized()
                        .json(serde_json::json!({ "message": format!("Invalid token: {}", e) }))
                        .map_into_boxed_body();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
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

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    let mongodb = Arc::new(MongoDB::init(&config.mongo_uri, &config.database_name).await);
    let chat_server = ChatServer::new().start();
    let http_client = reqwest::Client::new();

    println!("Server running at http://0.0.0.0:8080");
    println!("Allowed CORS Origin: {}", config.frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
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
            .wrap(Authentication::new(config.jwt_secret.clone()))
            .app_data(web::Data::new(AppState {
                chat_server: chat_server.clone(),
                mongodb: mongodb.clone(),
                config: config.clone(),
                http_client: http_client.clone(),
            }))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/profile", web::get().to(profile)),
            )
            .service(
                web::scope("/project")
                    .route("", web::get().to(list_projects))
                    .route("/create", web::post().to(create_project))
                    .route("/add", web::post().to(add_user))
                    .route("/check", web::post().to(check_project)),
            )
            .route("/ai", web::post().to(generate_endpoint))
            .service(web::scope("/git").route("/create", web::post().to(import_repo)))
            .service(web::resource("/ws").route(web::get().to(ws_index)))
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}
