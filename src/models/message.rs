// File: message.rs

use serde::{Deserialize, Serialize};

/// Wire form of a chat event on the realtime channel.
///
/// Messages exist only in socket transit and client memory; nothing is
/// persisted and a late joiner never sees earlier traffic.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub message: String,
    pub sender: String,
}

/// Who produced a chat entry, from the point of view of one client.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Me,
    Others,
    Ai,
    System,
}

/// A chat bubble as held in client-side view state.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatEntry {
    pub id: usize,
    pub text: String,
    pub sender: String,
    pub origin: MessageOrigin,
}

impl ChatEntry {
    pub fn system(id: usize, text: impl Into<String>) -> Self {
        ChatEntry {
            id,
            text: text.into(),
            sender: "System".to_string(),
            origin: MessageOrigin::System,
        }
    }
}
