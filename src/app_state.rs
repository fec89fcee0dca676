use crate::chat_server::ChatServer;
use crate::config::Config;
use crate::db::MongoDB;
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub chat_server: Addr<ChatServer>,
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
    pub http_client: reqwest::Client,
}
