mod message;

pub use message::{ChatEntry, ChatMessage, MessageOrigin};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Represents a registered user.
///
/// Emails are stored lowercased and trimmed; lookups go through the same
/// normalization. Response bodies are built by hand so the bcrypt hash
/// never leaves the server.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub password: String,
}

/// A named collaborative workspace with a member list.
///
/// `name` is unique and lowercase. `users` holds member user ids; membership
/// is set-like (adds go through `$addToSet`).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    pub users: Vec<String>,
    pub created_at: chrono::DateTime<Utc>,
}
