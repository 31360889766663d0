//! Chat session storage and transcript rendering.
//!
//! Sessions are JSON files in the sessions directory; the session key is
//! derived from the file path. Rendering a message runs the citation
//! annotator exactly once on the raw content, then markdown rendering and
//! sanitization. The annotator must never see its own output.

use crate::citations::annotate_citations;
use crate::models::{ChatMessage, ChatSession, MessageRole, StoredSession};
use chrono::{DateTime, Utc};
use pulldown_cmark::Parser;
use sha2::Digest;
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

// ============================================================================
// Session Keys
// ============================================================================

pub fn generate_session_key(path: &PathBuf) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest[..3].iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// Session Loading
// ============================================================================

pub fn load_session(path: &PathBuf, sessions_dir: &PathBuf) -> Option<ChatSession> {
    let content = fs::read_to_string(path).ok()?;
    let stored: StoredSession = serde_json::from_str(&content).ok()?;
    let relative = path.strip_prefix(sessions_dir).ok()?.to_path_buf();
    let key = generate_session_key(&relative);

    let metadata = fs::metadata(path).ok()?;
    let modified: DateTime<Utc> = metadata.modified().ok()?.into();

    Some(ChatSession {
        key,
        path: relative,
        title: stored.title,
        created: stored.created,
        messages: stored.messages,
        modified,
    })
}

pub fn load_all_sessions(sessions_dir: &PathBuf) -> Vec<ChatSession> {
    use rayon::prelude::*;

    let paths: Vec<PathBuf> = WalkDir::new(sessions_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "json")
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    let mut sessions: Vec<ChatSession> = paths
        .par_iter()
        .filter_map(|path| load_session(path, sessions_dir))
        .collect();

    sessions.sort_by(|a, b| b.modified.cmp(&a.modified));
    sessions
}

// ============================================================================
// Session Writing
// ============================================================================

fn write_session(full_path: &PathBuf, stored: &StoredSession) -> Result<(), String> {
    let json = serde_json::to_string_pretty(stored)
        .map_err(|e| format!("Cannot serialize session: {}", e))?;
    fs::write(full_path, json)
        .map_err(|e| format!("Failed to write session {}: {}", full_path.display(), e))
}

/// Create a new empty session file named after a slug of the title.
/// Returns the loaded session.
pub fn create_session(title: &str, sessions_dir: &PathBuf) -> Result<ChatSession, String> {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        return Err("Session title produces an empty filename".to_string());
    }

    let filename = format!("{}.json", slug);
    let full_path = sessions_dir.join(&filename);
    if full_path.exists() {
        return Err(format!("Session already exists: {}", filename));
    }

    let stored = StoredSession {
        title: title.to_string(),
        created: Utc::now(),
        messages: Vec::new(),
    };
    write_session(&full_path, &stored)?;

    load_session(&full_path, sessions_dir)
        .ok_or_else(|| format!("Failed to reload created session: {}", filename))
}

/// Append one message to a session file.
pub fn append_message(
    session: &ChatSession,
    role: MessageRole,
    content: &str,
    sessions_dir: &PathBuf,
) -> Result<ChatMessage, String> {
    let full_path = sessions_dir.join(&session.path);
    let raw = fs::read_to_string(&full_path)
        .map_err(|e| format!("Cannot read session {}: {}", full_path.display(), e))?;
    let mut stored: StoredSession =
        serde_json::from_str(&raw).map_err(|e| format!("Corrupt session file: {}", e))?;

    let message = ChatMessage {
        role,
        content: content.to_string(),
        timestamp: Utc::now(),
    };
    stored.messages.push(message.clone());
    write_session(&full_path, &stored)?;

    Ok(message)
}

// ============================================================================
// Text Escaping
// ============================================================================

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ============================================================================
// Message Rendering
// ============================================================================

/// Markdown to sanitized HTML. The sanitizer keeps the attributes citation
/// anchors depend on (`data-citation-id`, `class`, `target`).
pub fn render_markdown(content: &str) -> String {
    let parser = Parser::new(content);
    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    ammonia::Builder::default()
        .add_tag_attributes("a", &["class", "data-citation-id", "target"])
        .clean(&html_output)
        .to_string()
}

/// Render one raw message body to HTML. The citation annotator runs first,
/// once, on the raw markdown; its anchors pass through markdown rendering as
/// inline HTML.
pub fn render_message_html(raw: &str) -> String {
    let annotated = annotate_citations(raw);
    render_markdown(&annotated)
}

// ============================================================================
// Tests
// ============================================================================
