use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use log::error;
use mongodb::bson::doc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::User;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub msg: String,
    pub path: String,
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

// JWT Creation
pub fn create_jwt(email: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: email.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// express-validator style field checks: valid email, password >= 6 chars.
pub fn validate_credentials(email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !EMAIL_RE.is_match(email.trim()) {
        errors.push(FieldError {
            msg: "Email must be a valid email".to_string(),
            path: "email".to_string(),
        });
    }
    if password.len() < 6 {
        errors.push(FieldError {
            msg: "Password should be at least 6 characters".to_string(),
            path: "password".to_string(),
        });
    }
    errors
}

// Register Endpoint
pub async fn register(
    data: web::Data<AppState>,
    credentials: web::Json<Credentials>,
) -> impl Responder {
    let errors = validate_credentials(&credentials.email, &credentials.password);
    if !errors.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({ "errors": errors }));
    }

    let email = normalize_email(&credentials.email);
    let users_collection = data.mongodb.users();

    match users_collection.find_one(doc! { "email": &email }).await {
        Ok(Some(_)) => {
            return HttpResponse::BadRequest()
                .json(serde_json::json!({ "message": "User already exists" }))
        }
        Ok(None) => {}
        Err(e) => {
            error!("Error checking existing user: {}", e);
            return HttpResponse::InternalServerError().body("Error creating user");
        }
    }

    let hashed_password = match hash(&credentials.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return HttpResponse::InternalServerError().body("Error hashing password"),
    };

    let new_user = User {
        user_id: Uuid::new_v4().to_string(),
        email: email.clone(),
        password: hashed_password,
    };

    if let Err(e) = users_collection.insert_one(&new_user).await {
        error!("Error inserting user: {}", e);
        return HttpResponse::InternalServerError().body("Error creating user");
    }

    let token = match create_jwt(&email, &data.config.jwt_secret) {
        Ok(t) => t,
        Err(e) => {
            error!("Error signing token: {}", e);
            return HttpResponse::InternalServerError().body("Error creating user");
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "userResult": { "user_id": new_user.user_id, "email": new_user.email },
        "token": token,
    }))
}

// Login Endpoint
pub async fn login(
    data: web::Data<AppState>,
    credentials: web::Json<Credentials>,
) -> impl Responder {
    let errors = validate_credentials(&credentials.email, &credentials.password);
    if !errors.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({ "errors": errors }));
    }

    let email = normalize_email(&credentials.email);
    let users_collection = data.mongodb.users();

    match users_collection.find_one(doc! { "email": &email }).await {
        Ok(Some(user)) => {
            if verify(&credentials.password, &user.password).unwrap_or(false) {
                let token = match create_jwt(&user.email, &data.config.jwt_secret) {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Error signing token: {}", e);
                        return HttpResponse::InternalServerError().body("Error logging in");
                    }
                };
                HttpResponse::Ok().json(serde_json::json!({
                    "userResult": { "user_id": user.user_id, "email": user.email },
                    "token": token,
                }))
            } else {
                HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }))
            }
        }
        Ok(None) => {
            HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }))
        }
        Err(e) => {
            error!("Error logging in: {}", e);
            HttpResponse::InternalServerError().body("Error logging in")
        }
    }
}

// Profile Endpoint
pub async fn profile(req: HttpRequest) -> impl Responder {
    let email = if let Some(email) = req.extensions().get::<String>() {
        email.clone()
    } else {
        return HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }));
    };
    HttpResponse::Ok().json(serde_json::json!({ "message": { "email": email } }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn jwt_round_trips_to_the_same_email() {
        let token = create_jwt("dev@example.com", SECRET).unwrap();
        let claims = validate_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "dev@example.com");
    }

    #[test]
    fn expired_jwt_fails_validation() {
        let claims = Claims {
            sub: "dev@example.com".to_string(),
            exp: (Utc::now() - Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_ref()),
        )
        .unwrap();
        assert!(validate_jwt(&token, SECRET).is_err());
    }

    #[test]
    fn jwt_signed_with_other_secret_fails_validation() {
        let token = create_jwt("dev@example.com", "other-secret").unwrap();
        assert!(validate_jwt(&token, SECRET).is_err());
    }

    #[test]
    fn short_password_is_rejected() {
        let errors = validate_credentials("dev@example.com", "12345");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "password");
    }

    #[test]
    fn malformed_email_is_rejected() {
        let errors = validate_credentials("not-an-email", "longenough");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "email");
    }

    #[test]
    fn both_fields_reported_together() {
        let errors = validate_credentials("nope", "123");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  Dev@Example.COM "), "dev@example.com");
    }
}
