//! Conversation transcript persistence
//!
//! A transcript is a JSON array of role-tagged messages. Loading repairs
//! tool-call pairing so a transcript cut off mid tool round can be replayed
//! to the API without a 400.

use std::path::{Path, PathBuf};
use toolgate_llm::LlmMessage;
use tracing::{info, warn};

pub fn transcript_path(context_dir: &Path, session: &str) -> PathBuf {
    context_dir.join(format!("{}_conversation.json", session))
}

/// Drop assistant messages whose `tool_use` blocks are not answered by the
/// very next message, and `tool_result` messages with no `tool_use` right
/// before them. Returns the repaired list and how many messages were removed.
pub fn repair_orphaned_tool_calls(messages: Vec<LlmMessage>) -> (Vec<LlmMessage>, usize) {
    let total = messages.len();
    let mut kept: Vec<LlmMessage> = Vec::with_capacity(total);
    let mut iter = messages.into_iter().peekable();

    while let Some(msg) = iter.next() {
        if msg.has_tool_use() {
            let answered = iter.peek().is_some_and(|next| next.has_tool_result());
            if !answered {
                continue;
            }
        } else if msg.has_tool_result() {
            let paired = kept.last().is_some_and(|prev| prev.has_tool_use());
            if !paired {
                continue;
            }
        }
        kept.push(msg);
    }

    let removed = total - kept.len();
    (kept, removed)
}

/// Load a transcript, or an empty one if the file is missing or unreadable.
pub fn load(path: &Path) -> Vec<LlmMessage> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to read transcript {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    let messages: Vec<LlmMessage> = match serde_json::from_str(&raw) {
        Ok(messages) => messages,
        Err(e) => {
            warn!("Corrupt transcript {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let (messages, removed) = repair_orphaned_tool_calls(messages);
    if removed > 0 {
        info!("Removed {} orphaned tool messages from {}", removed, path.display());
    }
    messages
}

/// Best-effort save; failures are logged.
pub fn save(path: &Path, messages: &[LlmMessage]) -> bool {
    let result = serde_json::to_string_pretty(messages)
        .map_err(std::io::Error::from)
        .and_then(|json| std::fs::write(path, json));
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to save transcript {}: {}", path.display(), e);
            false
        }
    }
}
