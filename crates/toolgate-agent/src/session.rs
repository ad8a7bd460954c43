//! Session metadata table persisted in the context directory
//!
//! Layout of the context directory:
//!   sessions.json               table of SessionRecord keyed by name
//!   <name>_conversation.json    transcript (see `transcript`)
//!   <name>_session.state        auxiliary state, removed on clear
//!
//! No locking: concurrent processes writing the table race, last writer wins.

use crate::transcript;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toolgate_core::{Result, SessionKey};
use toolgate_llm::LlmMessage;
use tracing::{info, warn};

const TABLE_FILE: &str = "sessions.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_name: String,
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_context: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptSummary {
    pub name: String,
    pub message_count: usize,
    pub last_user_message: Option<String>,
}

pub struct SessionManager {
    context_dir: PathBuf,
    sessions: BTreeMap<String, SessionRecord>,
}

impl SessionManager {
    /// Open (creating if needed) a context directory and load its table.
    pub fn new(context_dir: impl AsRef<Path>) -> Result<Self> {
        let context_dir = context_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&context_dir)?;
        let sessions = load_table(&context_dir.join(TABLE_FILE));
        Ok(Self { context_dir, sessions })
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    pub fn transcript_path(&self, name: &SessionKey) -> PathBuf {
        transcript::transcript_path(&self.context_dir, name.as_str())
    }

    pub fn state_path(&self, name: &SessionKey) -> PathBuf {
        self.context_dir.join(format!("{}_session.state", name))
    }

    pub fn get(&self, name: &SessionKey) -> Option<&SessionRecord> {
        self.sessions.get(name.as_str())
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionRecord> {
        self.sessions.values()
    }

    /// Upsert a fresh record. Re-creating resets timestamps and the count.
    pub fn create_session(&mut self, name: &SessionKey, initial_context: Option<&str>) -> SessionRecord {
        let now = Utc::now();
        let record = SessionRecord {
            session_name: name.to_string(),
            created: now,
            last_accessed: now,
            message_count: 0,
            initial_context: initial_context.map(String::from),
        };
        self.sessions.insert(name.to_string(), record.clone());
        self.persist();
        info!("Session created: {}", name);
        record
    }

    /// Bump `last_accessed` and store the current message count, creating the
    /// record if it does not exist yet.
    pub fn touch(&mut self, name: &SessionKey, message_count: usize) {
        let now = Utc::now();
        self.sessions
            .entry(name.to_string())
            .and_modify(|r| {
                r.last_accessed = now;
                r.message_count = message_count;
            })
            .or_insert_with(|| SessionRecord {
                session_name: name.to_string(),
                created: now,
                last_accessed: now,
                message_count,
                initial_context: None,
            });
        self.persist();
    }

    /// Delete transcript, auxiliary state and the metadata entry.
    /// Best-effort: returns false and logs on any I/O failure.
    pub fn clear_context(&mut self, name: &SessionKey) -> bool {
        for path in [self.transcript_path(name), self.state_path(name)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to clear {}: {}", path.display(), e);
                    return false;
                }
            }
        }
        self.sessions.remove(name.as_str());
        if let Err(e) = self.save_table() {
            warn!("Failed to save session table after clearing {}: {}", name, e);
            return false;
        }
        info!("Session context cleared: {}", name);
        true
    }

    pub fn read_transcript(&self, name: &SessionKey) -> Vec<LlmMessage> {
        transcript::load(&self.transcript_path(name))
    }

    /// Every transcript on disk, sorted by session name.
    pub fn list_transcripts(&self) -> Vec<TranscriptSummary> {
        let entries = match std::fs::read_dir(&self.context_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list {}: {}", self.context_dir.display(), e);
                return Vec::new();
            }
        };

        let mut summaries: Vec<TranscriptSummary> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let name = file_name.strip_suffix("_conversation.json")?.to_string();
                let messages = transcript::load(&entry.path());
                let last_user_message = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == "user" && !m.has_tool_result())
                    .map(|m| m.text());
                Some(TranscriptSummary {
                    name,
                    message_count: messages.len(),
                    last_user_message,
                })
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    fn persist(&self) {
        if let Err(e) = self.save_table() {
            warn!("Failed to save session table: {}", e);
        }
    }

    fn save_table(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.sessions)?;
        std::fs::write(self.context_dir.join(TABLE_FILE), json)?;
        Ok(())
    }
}

fn load_table(path: &Path) -> BTreeMap<String, SessionRecord> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Corrupt session table {}: {}; starting empty", path.display(), e);
        BTreeMap::new()
    })
}
