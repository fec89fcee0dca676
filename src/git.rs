// src/git.rs

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use log::error;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use tokio::process::Command;

#[derive(Deserialize)]
pub struct ImportRequest {
    pub repo: String,
}

/// Walk a checkout into the same nested tree shape the AI gateway emits:
/// `{name: {file: {contents}}}` leaves under `{name: {directory: {...}}}`
/// nodes. Contents are trimmed; binary files degrade lossily.
pub fn read_dir_tree(dir: &Path) -> std::io::Result<Value> {
    let mut tree = Map::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name == ".git" {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            tree.insert(name, json!({ "directory": read_dir_tree(&path)? }));
        } else {
            let bytes = std::fs::read(&path)?;
            let contents = String::from_utf8_lossy(&bytes).trim().to_string();
            tree.insert(name, json!({ "file": { "contents": contents } }));
        }
    }
    Ok(Value::Object(tree))
}

/// POST /git/create
///
/// Shallow-clones a repository into a scratch directory and returns it as a
/// file tree the editor can load. The scratch dir is removed on drop.
pub async fn import_repo(req: HttpRequest, info: web::Json<ImportRequest>) -> impl Responder {
    if req.extensions().get::<String>().is_none() {
        return HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }));
    }

    let repo = info.repo.trim().to_string();
    if repo.is_empty() {
        return HttpResponse::BadRequest()
            .json(serde_json::json!({ "error": "Repository URL is required" }));
    }

    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("Failed to create scratch directory: {}", e);
            return HttpResponse::InternalServerError().body("Error importing repository");
        }
    };

    let status = Command::new("git")
        .arg("clone")
        .arg("--depth=1")
        .arg(&repo)
        .arg(scratch.path())
        .status()
        .await;
    match status {
        Ok(status) if status.success() => {}
        Ok(_) | Err(_) => {
            return HttpResponse::Ok()
                .json(serde_json::json!({ "message": "Repository clone failed" }))
        }
    }

    let tree = match web::block(move || {
        let tree = read_dir_tree(scratch.path());
        drop(scratch);
        tree
    })
    .await
    {
        Ok(Ok(tree)) => tree,
        Ok(Err(e)) => {
            error!("Failed to read checkout: {}", e);
            return HttpResponse::InternalServerError().body("Error importing repository");
        }
        Err(e) => {
            error!("Blocking task failed: {}", e);
            return HttpResponse::InternalServerError().body("Error importing repository");
        }
    };

    HttpResponse::Ok().json(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn checkout_walk_matches_the_gateway_tree_shape() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "console.log('hi')\n").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src").join("app.js"), "  const a = 1;  ").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("HEAD"), "ref: x").unwrap();

        let tree = read_dir_tree(dir.path()).unwrap();
        assert_eq!(
            tree["index.js"]["file"]["contents"],
            json!("console.log('hi')")
        );
        assert_eq!(
            tree["src"]["directory"]["app.js"]["file"]["contents"],
            json!("const a = 1;")
        );
        assert!(tree.get(".git").is_none());
    }

    #[test]
    fn empty_directory_is_an_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let tree = read_dir_tree(dir.path()).unwrap();
        assert_eq!(tree, json!({}));
    }
}
