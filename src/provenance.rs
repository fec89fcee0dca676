// src/provenance.rs

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which code path wrote a file. Never inferred from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    Ai,
    User,
}

/// Per-file authorship metadata. `created_by`/`created_at` are fixed by the
/// first write; every later write bumps `version` and overwrites the
/// `last_modified_*` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    pub created_by: Author,
    pub last_modified_by: Author,
    pub created_at: i64,
    pub last_modified_at: i64,
    pub version: u32,
}

/// Authorship log for one project, keyed by file path. Serialized to JSON
/// under `ai_code_memory_<projectId>` in the embedding client's local
/// storage; per-device state, never synced across clients.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProvenanceLog {
    records: HashMap<String, ProvenanceRecord>,
}

impl ProvenanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage_key(project_id: &str) -> String {
        format!("ai_code_memory_{}", project_id)
    }

    pub fn record(&mut self, path: &str, author: Author) {
        self.record_at(path, author, Utc::now().timestamp_millis());
    }

    pub fn record_at(&mut self, path: &str, author: Author, now_millis: i64) {
        self.records
            .entry(path.to_string())
            .and_modify(|record| {
                record.last_modified_by = author;
                record.last_modified_at = now_millis;
                record.version += 1;
            })
            .or_insert(ProvenanceRecord {
                created_by: author,
                last_modified_by: author,
                created_at: now_millis,
                last_modified_at: now_millis,
                version: 1,
            });
    }

    pub fn get(&self, path: &str) -> Option<&ProvenanceRecord> {
        self.records.get(path)
    }

    pub fn is_ai_generated(&self, path: &str) -> bool {
        self.get(path).map_or(false, |r| r.created_by == Author::Ai)
    }

    /// Paths first written by the model, sorted for deterministic prompts.
    pub fn ai_created_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .records
            .iter()
            .filter(|(_, r)| r.created_by == Author::Ai)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_starts_at_version_one() {
        let mut log = ProvenanceLog::new();
        log.record_at("app.js", Author::Ai, 1000);

        let record = log.get("app.js").unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.created_by, Author::Ai);
        assert_eq!(record.last_modified_by, Author::Ai);
        assert_eq!(record.created_at, 1000);
        assert_eq!(record.last_modified_at, 1000);
    }

    #[test]
    fn later_writes_bump_version_and_keep_creation() {
        let mut log = ProvenanceLog::new();
        log.record_at("app.js", Author::Ai, 1000);
        log.record_at("app.js", Author::User, 2000);

        let record = log.get("app.js").unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.created_by, Author::Ai);
        assert_eq!(record.created_at, 1000);
        assert_eq!(record.last_modified_by, Author::User);
        assert_eq!(record.last_modified_at, 2000);
    }

    #[test]
    fn ai_created_paths_filters_and_sorts() {
        let mut log = ProvenanceLog::new();
        log.record_at("b.js", Author::Ai, 1);
        log.record_at("a.js", Author::Ai, 1);
        log.record_at("notes.md", Author::User, 1);
        // A user edit to an AI file does not change who created it.
        log.record_at("b.js", Author::User, 2);

        assert_eq!(log.ai_created_paths(), vec!["a.js", "b.js"]);
        assert!(log.is_ai_generated("a.js"));
        assert!(!log.is_ai_generated("notes.md"));
    }

    #[test]
    fn log_round_trips_through_json() {
        let mut log = ProvenanceLog::new();
        log.record_at("src/index.ts", Author::Ai, 42);
        log.record_at("src/index.ts", Author::Ai, 43);

        let restored = ProvenanceLog::from_json(&log.to_json()).unwrap();
        assert_eq!(restored.get("src/index.ts"), log.get("src/index.ts"));
    }

    #[test]
    fn storage_key_is_scoped_by_project() {
        assert_eq!(
            ProvenanceLog::storage_key("abc-123"),
            "ai_code_memory_abc-123"
        );
    }
}
