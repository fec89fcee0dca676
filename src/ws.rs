use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::validate_jwt;
use crate::chat_server::{ChatServer, ClientMessage, Connect, Disconnect, WsMessage};
use crate::models::ChatMessage;

pub const PROJECT_MESSAGE_EVENT: &str = "project-message";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Envelope for events on the realtime channel. Only `project-message` is
/// recognized; anything else is logged and dropped.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireEvent {
    pub event: String,
    pub data: ChatMessage,
}

#[derive(Deserialize)]
pub struct WsQuery {
    pub project_id: String,
    pub token: Option<String>,
}

pub struct WebSocketConnection {
    pub id: Uuid,
    pub project_id: String,
    pub email: String,
    pub hb: Instant,
    pub addr: Addr<ChatServer>,
}

impl Actor for WebSocketConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.addr.do_send(Connect {
            project_id: self.project_id.clone(),
            session_id: self.id,
            addr: ctx.address().recipient(),
        });
        info!("{} connected to project room {}", self.email, self.project_id);
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        self.addr.do_send(Disconnect {
            project_id: self.project_id.clone(),
            session_id: self.id,
        });
    }
}

impl WebSocketConnection {
    pub fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("WebSocket client heartbeat failed, disconnecting.");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                // Bad frames are swallowed; the connection stays up.
                match serde_json::from_str::<WireEvent>(&text) {
                    Ok(incoming) if incoming.event == PROJECT_MESSAGE_EVENT => {
                        self.addr.do_send(ClientMessage {
                            project_id: self.project_id.clone(),
                            session_id: self.id,
                            message: incoming.data,
                        });
                    }
                    Ok(incoming) => {
                        warn!("Ignoring unknown event: {}", incoming.event);
                    }
                    Err(e) => {
                        warn!("Failed to parse message: {}", e);
                    }
                }
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<WsMessage> for WebSocketConnection {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.text(msg.0);
    }
}

/// GET /ws?project_id=<id>&token=<jwt>
///
/// The token rides in the query (the handshake `auth.token` slot) or the
/// Authorization header; verification failure refuses the upgrade.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, Error> {
    let token = query.token.clone().or_else(|| {
        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.starts_with("Bearer "))
            .map(|value| value["Bearer ".len()..].trim().to_string())
    });

    let claims = match token.and_then(|t| validate_jwt(&t, &data.config.jwt_secret).ok()) {
        Some(claims) => claims,
        None => {
            return Ok(HttpResponse::Unauthorized()
                .json(serde_json::json!({ "message": "Unauthorized" })))
        }
    };

    let connection = WebSocketConnection {
        id: Uuid::new_v4(),
        project_id: query.project_id.clone(),
        email: claims.sub,
        hb: Instant::now(),
        addr: data.chat_server.clone(),
    };
    ws::start(connection, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_event_round_trips() {
        let event = WireEvent {
            event: PROJECT_MESSAGE_EVENT.to_string(),
            data: ChatMessage {
                message: "@ai create a todo app".to_string(),
                sender: "dev@example.com".to_string(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: WireEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event, PROJECT_MESSAGE_EVENT);
        assert_eq!(back.data.message, "@ai create a todo app");
        assert_eq!(back.data.sender, "dev@example.com");
    }

    #[test]
    fn malformed_frames_do_not_parse() {
        assert!(serde_json::from_str::<WireEvent>("not json").is_err());
        assert!(serde_json::from_str::<WireEvent>(r#"{"event":"project-message"}"#).is_err());
    }
}
