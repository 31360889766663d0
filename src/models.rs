//! Data models for the chat application.
//!
//! Core structures for chat sessions, the document store backing citations,
//! and the JSON wire formats of the citation API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Chat Sessions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub key: String,
    pub path: PathBuf,
    pub title: String,
    pub created: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub modified: DateTime<Utc>,
}

/// On-disk form of a session; the key and path are derived at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub title: String,
    pub created: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Metadata for one document in the store. Citation ids are
/// `<doc_id>_<page>`; `enhanced_citations` is the per-document opt-in/out
/// consulted by the viewer decision table (None means "not stated").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_id: String,
    pub path: PathBuf,
    pub title: String,
    /// Display label for citations; may be an absolute URL.
    pub file_name: String,
    pub pdf: Option<String>,
    pub enhanced_citations: Option<bool>,
    pub description: String,
    pub modified: DateTime<Utc>,
}

// ============================================================================
// Citation API Wire Formats
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CitationRequest {
    pub citation_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitationResponse {
    pub cited_text: String,
    pub file_name: String,
    pub page_number: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitationErrorResponse {
    pub error: String,
}

/// Answer to POST /api/resolve_citation: which viewer the client should use.
/// `doc_id`/`page` are absent when the citation id did not split.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    pub action: String,
    pub doc_id: Option<String>,
    pub page: Option<u64>,
}

// ============================================================================
// Session API Wire Formats
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AppendMessageRequest {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSessionRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSessionResponse {
    pub key: String,
    pub title: String,
}
