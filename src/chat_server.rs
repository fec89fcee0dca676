use actix::prelude::*;
use log::info;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::ChatMessage;

/// Serialized wire event pushed down one websocket session.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct WsMessage(pub String);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub project_id: String,
    pub session_id: Uuid,
    pub addr: Recipient<WsMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub project_id: String,
    pub session_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ClientMessage {
    pub project_id: String,
    pub session_id: Uuid,
    pub message: ChatMessage,
}

/// Per-project rooms. Sessions are identified by a connection-scoped uuid so
/// one user can hold several tabs open on the same project.
pub struct Rooms<A> {
    rooms: HashMap<String, Vec<(Uuid, A)>>,
}

impl<A> Rooms<A> {
    pub fn new() -> Self {
        Rooms {
            rooms: HashMap::new(),
        }
    }

    pub fn join(&mut self, project_id: &str, session_id: Uuid, addr: A) {
        self.rooms
            .entry(project_id.to_string())
            .or_default()
            .push((session_id, addr));
    }

    pub fn leave(&mut self, project_id: &str, session_id: Uuid) {
        if let Some(members) = self.rooms.get_mut(project_id) {
            members.retain(|(id, _)| *id != session_id);
            if members.is_empty() {
                self.rooms.remove(project_id);
            }
        }
    }

    /// Every member of the room except the sender.
    pub fn peers(&self, project_id: &str, sender: Uuid) -> impl Iterator<Item = &A> {
        self.rooms
            .get(project_id)
            .into_iter()
            .flatten()
            .filter(move |(id, _)| *id != sender)
            .map(|(_, addr)| addr)
    }

    pub fn room_size(&self, project_id: &str) -> usize {
        self.rooms.get(project_id).map_or(0, |m| m.len())
    }
}

/// Relays `project-message` events to every other member of a project room.
/// Fire-and-forget: nothing is persisted and late joiners see no history.
pub struct ChatServer {
    rooms: Rooms<Recipient<WsMessage>>,
}

impl ChatServer {
    pub fn new() -> Self {
        ChatServer {
            rooms: Rooms::new(),
        }
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!(
            "Session {} joined project room {}",
            msg.session_id, msg.project_id
        );
        self.rooms.join(&msg.project_id, msg.session_id, msg.addr);
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!(
            "Session {} left project room {}",
            msg.session_id, msg.project_id
        );
        self.rooms.leave(&msg.project_id, msg.session_id);
    }
}

impl Handler<ClientMessage> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: ClientMessage, _: &mut Context<Self>) {
        let event = crate::ws::WireEvent {
            event: crate::ws::PROJECT_MESSAGE_EVENT.to_string(),
            data: msg.message,
        };
        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Failed to serialize chat event: {}", e);
                return;
            }
        };
        for addr in self.rooms.peers(&msg.project_id, msg.session_id) {
            addr.do_send(WsMessage(payload.clone()));
        }
    }
}
