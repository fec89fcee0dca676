// src/ai.rs

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::app_state::AppState;
use crate::config::Config;

/// Hard ceiling on one model round-trip.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Chat bubbles stay short; longer `text` fields get cut at this length.
const MAX_TEXT_LEN: usize = 300;
/// How much raw model output survives when no JSON can be recovered.
const RAW_FALLBACK_LEN: usize = 1000;

const SYSTEM_INSTRUCTION: &str = r#"
You are a senior full-stack developer creating clean, production-ready code.

Always respond in this JSON format:
{
  "text": "Brief description of what you created",
  "fileTree": {
    "filename.ext": {
      "file": {
        "contents": "file content here"
      }
    },
    "another-file.ext": {
      "file": {
        "contents": "more content here"
      }
    }
  },
  "codeType": "javascript or typescript",
  "buildCommand": {
    "mainItem": "npm",
    "commands": ["install"]
  },
  "startCommand": {
    "mainItem": "node or npm",
    "commands": ["start or filename.js"]
  }
}

IMPORTANT: Always use this exact JSON structure with "file" and "contents" properties.
"#;

lazy_static! {
    static ref CONVERSATIONAL_RE: Regex = Regex::new(
        r"(?i)^(hi|hello|hey|how are you|what's up|good morning|good afternoon|good evening|thanks|thank you)"
    )
    .unwrap();
}

/// What the gateway hands back to the chat layer. Every field is untrusted
/// upstream, so everything defaults and `fileTree` stays raw JSON until the
/// sync engine normalizes it.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AiResponsePayload {
    pub text: String,
    pub file_tree: serde_json::Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_command: Option<Value>,
}

impl AiResponsePayload {
    pub fn text_only(text: impl Into<String>) -> Self {
        AiResponsePayload {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
pub struct AiRequest {
    pub prompt: String,
}

pub fn is_conversational(prompt: &str) -> bool {
    CONVERSATIONAL_RE.is_match(prompt.trim())
}

fn degraded_payload() -> AiResponsePayload {
    AiResponsePayload::text_only(
        "Sorry, I encountered an error processing your request. Please try again with a simpler prompt.",
    )
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Greedy brace match: the largest `{...}` substring of the raw reply.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        Some(&raw[start..=end])
    } else {
        None
    }
}

/// Coerce a raw model reply into a well-formed payload. Direct parse first
/// (with the bubble-length cut on `text`), then the brace-matched substring,
/// then a raw-text fallback. Never fails.
pub fn normalize_model_reply(raw: &str) -> AiResponsePayload {
    if let Ok(mut payload) = serde_json::from_str::<AiResponsePayload>(raw) {
        if payload.text.chars().count() > MAX_TEXT_LEN {
            payload.text = truncate_chars(&payload.text, MAX_TEXT_LEN) + "...";
        }
        return payload;
    }

    warn!("Model reply was not valid JSON, attempting to extract JSON portion");
    if let Some(candidate) = extract_json_object(raw) {
        if let Ok(payload) = serde_json::from_str::<AiResponsePayload>(candidate) {
            return payload;
        }
    }

    AiResponsePayload::text_only(truncate_chars(raw, RAW_FALLBACK_LEN))
}

/// Pull the reply text out of a generateContent response body.
fn reply_text(body: &Value) -> Option<String> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

async fn call_model(
    client: &reqwest::Client,
    config: &Config,
    model: &str,
    body: Value,
) -> Result<String, String> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        config.ai_endpoint.trim_end_matches('/'),
        model,
        config.ai_api_key,
    );

    let request = client.post(&url).json(&body).send();
    let response = match tokio::time::timeout(GENERATE_TIMEOUT, request).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => return Err(format!("AI service unreachable: {}", e)),
        Err(_) => return Err("AI request timed out".to_string()),
    };
    if !response.status().is_success() {
        return Err(format!("AI service error: {}", response.status()));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| format!("AI response parse error: {}", e))?;
    reply_text(&body).ok_or_else(|| "Empty response from AI service".to_string())
}

/// Run a prompt through the hosted model and always come back with a
/// well-formed payload; transport failures degrade instead of propagating so
/// the chat flow never breaks on a bad generation.
pub async fn generate(client: &reqwest::Client, config: &Config, prompt: &str) -> AiResponsePayload {
    if is_conversational(prompt) {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 1000 },
        });
        return match call_model(client, config, &config.ai_chat_model, body).await {
            Ok(text) => AiResponsePayload::text_only(text),
            Err(e) => {
                error!("AI service error: {}", e);
                degraded_payload()
            }
        };
    }

    let body = serde_json::json!({
        "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "temperature": 0.4,
            "maxOutputTokens": 8192,
        },
    });
    match call_model(client, config, &config.ai_model, body).await {
        Ok(raw) => normalize_model_reply(&raw),
        Err(e) => {
            error!("AI service error: {}", e);
            degraded_payload()
        }
    }
}

/// POST /ai
pub async fn generate_endpoint(
    req: HttpRequest,
    data: web::Data<AppState>,
    ai_request: web::Json<AiRequest>,
) -> impl Responder {
    if req.extensions().get::<String>().is_none() {
        return HttpResponse::Unauthorized().json(serde_json::json!({ "message": "Unauthorized" }));
    }

    info!("AI generation requested");
    let payload = generate(&data.http_client, &data.config, &ai_request.prompt).await;
    HttpResponse::Ok().json(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_json_passes_through() {
        let raw = r#"{"text":"made a server","fileTree":{"app.js":{"file":{"contents":"x"}}},"codeType":"javascript"}"#;
        let payload = normalize_model_reply(raw);
        assert_eq!(payload.text, "made a server");
        assert_eq!(payload.code_type.as_deref(), Some("javascript"));
        assert!(payload.file_tree.contains_key("app.js"));
    }

    #[test]
    fn long_text_is_cut_to_bubble_length() {
        let long = "x".repeat(400);
        let raw = format!(r#"{{"text":"{}","fileTree":{{}}}}"#, long);
        let payload = normalize_model_reply(&raw);
        assert_eq!(payload.text.chars().count(), 303);
        assert!(payload.text.ends_with("..."));
    }

    #[test]
    fn text_at_the_limit_is_untouched() {
        let exact = "y".repeat(300);
        let raw = format!(r#"{{"text":"{}","fileTree":{{}}}}"#, exact);
        let payload = normalize_model_reply(&raw);
        assert_eq!(payload.text, exact);
    }

    #[test]
    fn embedded_object_is_extracted() {
        let raw = "Sure! Here is the project:\n```json\n{\"text\":\"done\",\"fileTree\":{}}\n```\nEnjoy!";
        let payload = normalize_model_reply(raw);
        assert_eq!(payload.text, "done");
    }

    #[test]
    fn garbage_degrades_to_raw_text() {
        let raw = "no json here at all";
        let payload = normalize_model_reply(raw);
        assert_eq!(payload.text, raw);
        assert!(payload.file_tree.is_empty());
    }

    #[test]
    fn oversized_garbage_is_capped() {
        let raw = "a".repeat(5000);
        let payload = normalize_model_reply(&raw);
        assert_eq!(payload.text.chars().count(), 1000);
    }

    #[test]
    fn missing_fields_default() {
        let payload = normalize_model_reply(r#"{"text":"just chatting"}"#);
        assert!(payload.file_tree.is_empty());
        assert!(payload.code_type.is_none());
    }

    #[test]
    fn brace_extraction_spans_first_to_last() {
        assert_eq!(extract_json_object("ab {1} cd {2} ef"), Some("{1} cd {2}"));
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("} reversed {"), None);
    }

    #[test]
    fn greetings_are_conversational() {
        assert!(is_conversational("Hi there!"));
        assert!(is_conversational("  thanks a lot"));
        assert!(is_conversational("GOOD MORNING"));
    }

    #[test]
    fn code_prompts_are_not_conversational() {
        assert!(!is_conversational("create a todo app"));
        assert!(!is_conversational("modify the button"));
    }
}
