//! SimpleChat - chat transcripts with document-grounded citations.
//!
//! Library root: application state, configuration, and re-exports.
//!
//! - `models`: Data structures for sessions, documents, and the citation API
//! - `citations`: Citation annotation, resolution, and API handlers
//! - `documents`: Document descriptors and cited-text extraction
//! - `transcript`: Session storage and message rendering
//! - `templates`: HTML/CSS/JS for the web interface
//! - `handlers`: HTTP route handlers

use sled::Db;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

pub mod citations;
pub mod documents;
pub mod handlers;
pub mod models;
pub mod templates;
pub mod transcript;

// ============================================================================
// Configuration
// ============================================================================

pub const SESSIONS_DIR: &str = "sessions";
pub const DOCUMENTS_DIR: &str = "documents";
pub const DB_PATH: &str = ".simplechat_db";

/// Env var gating the enhanced citation viewer globally. Unset means on;
/// "0", "false", or "off" (any case) turn it off.
pub const ENHANCED_CITATIONS_ENV: &str = "CHAT_ENHANCED_CITATIONS";

fn enhanced_citations_from_env() -> bool {
    match env::var(ENHANCED_CITATIONS_ENV) {
        Ok(v) => !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "off"),
        Err(_) => true,
    }
}

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub sessions_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub db: Db,
    /// Global enhanced-citations flag, read once at startup.
    pub enhanced_citations: bool,
}

impl AppState {
    pub fn new() -> Self {
        let sessions_dir = PathBuf::from(SESSIONS_DIR);
        fs::create_dir_all(&sessions_dir).ok();

        let documents_dir = PathBuf::from(DOCUMENTS_DIR);
        fs::create_dir_all(&documents_dir).ok();

        let db = sled::open(DB_PATH).expect("Failed to open database");

        Self {
            sessions_dir,
            documents_dir,
            db,
            enhanced_citations: enhanced_citations_from_env(),
        }
    }

    pub fn load_sessions(&self) -> Vec<models::ChatSession> {
        transcript::load_all_sessions(&self.sessions_dir)
    }

    pub fn sessions_map(&self) -> HashMap<String, models::ChatSession> {
        self.load_sessions()
            .into_iter()
            .map(|s| (s.key.clone(), s))
            .collect()
    }

    pub fn load_documents(&self) -> Vec<models::DocumentMeta> {
        documents::load_all_documents(&self.documents_dir)
    }

    pub fn document_map(&self) -> HashMap<String, models::DocumentMeta> {
        self.load_documents()
            .into_iter()
            .map(|d| (d.doc_id.clone(), d))
            .collect()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate that a constructed path stays within the given base directory.
/// Returns the validated path on success, or an error message on failure.
pub fn validate_path_within(base: &PathBuf, target: &PathBuf) -> Result<PathBuf, String> {
    let canonical_base =
        fs::canonicalize(base).map_err(|e| format!("Cannot resolve base directory: {}", e))?;

    let canonical = fs::canonicalize(target).map_err(|e| format!("Cannot resolve path: {}", e))?;
    if canonical.starts_with(&canonical_base) {
        Ok(canonical)
    } else {
        Err("Path escapes base directory".to_string())
    }
}

// Re-export commonly used types
pub use citations::{
    annotate_citations, anchor_if_ref, decide_action, split_citation_id, CitationAction,
};
pub use models::{
    AppendMessageRequest, ChatMessage, ChatSession, CitationErrorResponse, CitationRequest,
    CitationResponse, DocumentMeta, MessageRole, NewSessionRequest, NewSessionResponse,
    ResolveResponse, StoredSession,
};
pub use transcript::{html_escape, render_markdown, render_message_html};
