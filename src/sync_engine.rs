// src/sync_engine.rs

use log::warn;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::ai::AiResponsePayload;
use crate::file_tree::{decode_lenient, decode_strict};
use crate::intent::{classify, replaces_tree, Intent};
use crate::models::{ChatEntry, ChatMessage, MessageOrigin};
use crate::provenance::{Author, ProvenanceLog};

/// Literal chat trigger, case-sensitive, single trailing space. The prompt is
/// whatever follows it, verbatim.
pub const AI_TRIGGER: &str = "@ai ";

const AI_ERROR_BUBBLE: &str = "AI Error: Unable to process request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    AwaitingAi,
}

/// The client-side call to the gateway endpoint can still fail in transit
/// even though the gateway itself always degrades gracefully.
#[derive(Debug, Error)]
#[error("AI gateway unreachable: {0}")]
pub struct GatewayError(pub String);

/// A pending generation: the context-enriched prompt to send and the intent
/// that decides how the reply is folded back in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiTurn {
    pub prompt: String,
    pub intent: Intent,
}

/// One client's view of a project: chat log, editable file tree, open tabs,
/// and per-file authorship. Transport-free; the embedding client feeds it
/// incoming chat events and executes the `AiTurn`s it hands back.
///
/// State is per-view and per-device. Clients diverge as soon as one of them
/// applies an AI update; there is deliberately no cross-client reconciliation.
pub struct SyncEngine {
    project_id: String,
    user_email: String,
    state: EngineState,
    messages: Vec<ChatEntry>,
    file_tree: BTreeMap<String, String>,
    open_tabs: Vec<String>,
    selected_file: Option<String>,
    code_type: Option<String>,
    provenance: ProvenanceLog,
}

impl SyncEngine {
    pub fn new(project_id: impl Into<String>, user_email: impl Into<String>) -> Self {
        SyncEngine {
            project_id: project_id.into(),
            user_email: user_email.into(),
            state: EngineState::Idle,
            messages: Vec::new(),
            file_tree: BTreeMap::new(),
            open_tabs: Vec::new(),
            selected_file: None,
            code_type: None,
            provenance: ProvenanceLog::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn messages(&self) -> &[ChatEntry] {
        &self.messages
    }

    pub fn file_tree(&self) -> &BTreeMap<String, String> {
        &self.file_tree
    }

    pub fn open_tabs(&self) -> &[String] {
        &self.open_tabs
    }

    pub fn selected_file(&self) -> Option<&str> {
        self.selected_file.as_deref()
    }

    pub fn code_type(&self) -> Option<&str> {
        self.code_type.as_deref()
    }

    pub fn provenance(&self) -> &ProvenanceLog {
        &self.provenance
    }

    /// Feed one incoming chat event. The entry always lands in the log; a
    /// trigger prefix additionally arms a generation when the engine is idle.
    /// A trigger arriving mid-flight is logged only, so at most one call is
    /// outstanding per view.
    pub fn on_incoming(&mut self, msg: &ChatMessage) -> Option<AiTurn> {
        let origin = if msg.sender == self.user_email {
            MessageOrigin::Me
        } else {
            MessageOrigin::Others
        };
        self.push_entry(msg.message.clone(), msg.sender.clone(), origin);

        let prompt = msg.message.strip_prefix(AI_TRIGGER)?;
        if self.state != EngineState::Idle {
            warn!("Ignoring AI trigger while a generation is in flight");
            return None;
        }

        let intent = classify(prompt);
        let enriched = self.enrich_prompt(prompt, intent);
        self.state = EngineState::AwaitingAi;
        Some(AiTurn {
            prompt: enriched,
            intent,
        })
    }

    /// Fold a finished generation back into view state. Always lands in
    /// `Idle`; a transport failure surfaces as a single System bubble and
    /// changes nothing else.
    pub fn complete(&mut self, turn: &AiTurn, result: Result<AiResponsePayload, GatewayError>) {
        self.state = EngineState::Idle;

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                warn!("{}", e);
                self.push_system(AI_ERROR_BUBBLE);
                return;
            }
        };

        self.push_entry(payload.text.clone(), "AI".to_string(), MessageOrigin::Ai);

        if payload.file_tree.is_empty() {
            return;
        }

        // Strict decode against the declared shape; recovery is a separate,
        // explicit pass over the same entries.
        let normalized = match decode_strict(&payload.file_tree) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("{}, falling back to lenient decode", e);
                decode_lenient(&payload.file_tree)
            }
        };

        if replaces_tree(turn.intent) {
            self.file_tree = normalized.clone();
            self.open_tabs.clear();
            self.selected_file = None;
        } else {
            self.file_tree.extend(normalized.clone());
        }

        for path in normalized.keys() {
            self.provenance.record(path, Author::Ai);
        }

        let updated: Vec<String> = normalized.keys().cloned().collect();
        if let Some(display) = Self::pick_display_file(&updated) {
            self.select_file(&display);
        }

        if let Some(code_type) = payload.code_type {
            self.code_type = Some(code_type);
        }

        self.push_system(format!("Files updated: {}", updated.join(", ")));
    }

    /// A direct edit from the editor pane.
    pub fn record_user_edit(&mut self, path: &str, content: impl Into<String>) {
        self.file_tree.insert(path.to_string(), content.into());
        self.provenance.record(path, Author::User);
    }

    /// Make a file the active one, opening a tab for it if needed.
    pub fn select_file(&mut self, path: &str) {
        if !self.open_tabs.iter().any(|t| t == path) {
            self.open_tabs.push(path.to_string());
        }
        self.selected_file = Some(path.to_string());
    }

    /// Close a tab; if it was active, the left neighbor takes over (or the
    /// right one when the first tab closes).
    pub fn close_tab(&mut self, path: &str) {
        let Some(idx) = self.open_tabs.iter().position(|t| t == path) else {
            return;
        };
        if self.selected_file.as_deref() == Some(path) {
            if self.open_tabs.len() > 1 {
                let neighbor = if idx == 0 { 1 } else { idx - 1 };
                self.selected_file = Some(self.open_tabs[neighbor].clone());
            } else {
                self.selected_file = None;
            }
        }
        self.open_tabs.remove(idx);
    }

    /// Local-storage key for this view's provenance snapshot.
    pub fn storage_key(&self) -> String {
        ProvenanceLog::storage_key(&self.project_id)
    }

    pub fn history_json(&self) -> String {
        self.provenance.to_json()
    }

    pub fn load_history(&mut self, json: &str) {
        match ProvenanceLog::from_json(json) {
            Ok(log) => self.provenance = log,
            Err(e) => warn!("Failed to load AI code history: {}", e),
        }
    }

    fn pick_display_file(updated: &[String]) -> Option<String> {
        updated
            .iter()
            .find(|path| path.ends_with(".ts"))
            .or_else(|| updated.first())
            .cloned()
    }

    fn enrich_prompt(&self, prompt: &str, intent: Intent) -> String {
        let instruction = match intent {
            Intent::Modify => "\nPlease modify these files according to my request.",
            Intent::TypeScriptConversion => {
                "\nPlease convert this project to TypeScript by creating new TypeScript files \
                 with appropriate extensions and configuration files. Don't simply modify the \
                 existing files, but transform the project structure for TypeScript."
            }
            _ => return prompt.to_string(),
        };

        let ai_files = self.provenance.ai_created_paths();
        if ai_files.is_empty() {
            return prompt.to_string();
        }

        let mut enriched = String::from(prompt);
        enriched.push_str("\n\nHere are the current files I've generated:\n");
        for path in ai_files {
            if let Some(content) = self.file_tree.get(&path) {
                enriched.push_str(&format!("\nFile: {}\n```\n{}\n```\n", path, content));
            }
        }
        enriched.push_str(instruction);
        enriched
    }

    fn push_entry(&mut self, text: String, sender: String, origin: MessageOrigin) {
        let id = self.messages.len() + 1;
        self.messages.push(ChatEntry {
            id,
            text,
            sender,
            origin,
        });
    }

    fn push_system(&mut self, text: impl Into<String>) {
        let id = self.messages.len() + 1;
        self.messages.push(ChatEntry::system(id, text));
    }
}

/// Thin client for the gateway endpoint, for embedding the engine outside a
/// browser. Mirrors what the web client does over REST.
pub struct HttpAiClient {
    pub base_url: String,
    pub token: String,
    pub client: reqwest::Client,
}

impl HttpAiClient {
    pub async fn generate(&self, prompt: &str) -> Result<AiResponsePayload, GatewayError> {
        let url = format!("{}/ai", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| GatewayError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError(format!(
                "AI endpoint error: {}",
                response.status()
            )));
        }
        response
            .json::<AiResponsePayload>()
            .await
            .map_err(|e| GatewayError(e.to_string()))
    }
}

/// Drive one incoming message end to end: arm the engine, execute the
/// pending turn against the gateway, fold the result back in.
pub async fn run_message(engine: &mut SyncEngine, client: &HttpAiClient, msg: &ChatMessage) {
    if let Some(turn) = engine.on_incoming(msg) {
        let result = client.generate(&turn.prompt).await;
        engine.complete(&turn, result);
    }
}
