// src/project.rs

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::{Project, User};

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckProjectRequest {
    pub name: String,
}

/// Project names are stored lowercase; every lookup goes through this first.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

async fn find_user_by_email(
    data: &AppState,
    email: &str,
) -> Result<Option<User>, mongodb::error::Error> {
    let users_collection = data.mongodb.users();
    users_collection.find_one(doc! { "email": email }).await
}

/// POST /project/create
pub async fn create_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    project_info: web::Json<CreateProjectRequest>,
) -> impl Responder {
    let current_email = if let Some(email) = req.extensions().get::<String>() {
        email.clone()
    } else {
        return HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }));
    };

    let name = normalize_name(&project_info.name);
    if name.is_empty() {
        return HttpResponse::BadRequest()
            .json(serde_json::json!({ "message": "Project name is required" }));
    }

    let current_user = match find_user_by_email(&data, &current_email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::BadRequest()
                .json(serde_json::json!({ "message": "User doesn't exist" }))
        }
        Err(e) => {
            error!("Error resolving user {}: {}", current_email, e);
            return HttpResponse::InternalServerError().body("Error creating project");
        }
    };

    let projects_collection = data.mongodb.projects();
    match projects_collection.find_one(doc! { "name": &name }).await {
        Ok(Some(_)) => {
            return HttpResponse::Conflict()
                .json(serde_json::json!({ "message": "Project already exists" }))
        }
        Ok(None) => {}
        Err(e) => {
            error!("Error checking project name: {}", e);
            return HttpResponse::InternalServerError().body("Error creating project");
        }
    }

    let new_project = Project {
        project_id: Uuid::new_v4().to_string(),
        name,
        users: vec![current_user.user_id],
        created_at: Utc::now(),
    };
    if let Err(e) = projects_collection.insert_one(&new_project).await {
        error!("Error creating project: {}", e);
        return HttpResponse::InternalServerError().body("Error creating project");
    }
    info!("Project created {:?}", new_project.project_id);

    HttpResponse::Ok().json(new_project)
}

/// GET /project
pub async fn list_projects(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_email = if let Some(email) = req.extensions().get::<String>() {
        email.clone()
    } else {
        return HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }));
    };

    let current_user = match find_user_by_email(&data, &current_email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::BadRequest()
                .json(serde_json::json!({ "message": "User doesn't exist" }))
        }
        Err(e) => {
            error!("Error resolving user {}: {}", current_email, e);
            return HttpResponse::InternalServerError().body("Error fetching projects");
        }
    };

    let projects_collection = data.mongodb.projects();
    let mut cursor = match projects_collection
        .find(doc! { "users": &current_user.user_id })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching projects: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching projects");
        }
    };

    let mut projects = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(project) => projects.push(project),
            Err(e) => {
                error!("Cursor error: {}", e);
                return HttpResponse::InternalServerError().body("Error reading projects");
            }
        }
    }

    if projects.is_empty() {
        return HttpResponse::Ok().json(serde_json::json!({ "message": "No projects found" }));
    }
    HttpResponse::Ok().json(projects)
}

/// POST /project/add
///
/// The requester must already be a member; the target user is appended with
/// `$addToSet`, so repeated adds leave a single membership entry.
pub async fn add_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    add_info: web::Json<AddUserRequest>,
) -> impl Responder {
    let current_email = if let Some(email) = req.extensions().get::<String>() {
        email.clone()
    } else {
        return HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }));
    };

    let current_user = match find_user_by_email(&data, &current_email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::BadRequest()
                .json(serde_json::json!({ "message": "User doesn't exist" }))
        }
        Err(e) => {
            error!("Error resolving user {}: {}", current_email, e);
            return HttpResponse::InternalServerError().body("Error adding user");
        }
    };

    let target_email = crate::auth::normalize_email(&add_info.email);
    let target_user = match find_user_by_email(&data, &target_email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(serde_json::json!({ "message": "User not found" }))
        }
        Err(e) => {
            error!("Error resolving user {}: {}", target_email, e);
            return HttpResponse::InternalServerError().body("Error adding user");
        }
    };

    let name = normalize_name(&add_info.name);
    let projects_collection = data.mongodb.projects();
    match projects_collection
        .update_one(
            doc! { "name": &name, "users": &current_user.user_id },
            doc! { "$addToSet": { "users": &target_user.user_id } },
        )
        .await
    {
        Ok(result) if result.matched_count == 1 => {
            info!("Added {} to project {}", target_user.user_id, name);
            HttpResponse::Ok().json(serde_json::json!({ "message": "User added to project" }))
        }
        Ok(_) => {
            HttpResponse::NotFound().json(serde_json::json!({ "message": "Project not found" }))
        }
        Err(e) => {
            error!("Error adding user to project: {}", e);
            HttpResponse::InternalServerError().body("Error adding user")
        }
    }
}

/// POST /project/check
///
/// Existence/membership gate the client consults before opening the chat
/// view; a falsy `message` sends the caller back to the project list.
pub async fn check_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    check_info: web::Json<CheckProjectRequest>,
) -> impl Responder {
    if req.extensions().get::<String>().is_none() {
        return HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }));
    }

    let name = normalize_name(&check_info.name);
    let projects_collection = data.mongodb.projects();
    match projects_collection.find_one(doc! { "name": &name }).await {
        Ok(Some(project)) => HttpResponse::Ok().json(serde_json::json!({
            "message": true,
            "id": project.project_id,
        })),
        Ok(None) => HttpResponse::Ok().json(serde_json::json!({ "message": false, "id": "" })),
        Err(e) => {
            error!("Error checking project: {}", e);
            HttpResponse::InternalServerError().body("Error checking project")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercased_and_trimmed() {
        assert_eq!(normalize_name("  My Project "), "my project");
        assert_eq!(normalize_name("TODO-App"), "todo-app");
    }
}
