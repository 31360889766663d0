//! HTTP route handlers for the transcript pages and session API.

use crate::models::{AppendMessageRequest, NewSessionRequest, NewSessionResponse};
use crate::templates::{base_html, render_transcript};
use crate::transcript;
use crate::transcript::html_escape;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use std::sync::Arc;

// ============================================================================
// Index Handler
// ============================================================================

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let sessions = state.load_sessions();

    let mut list_html = String::from("<ul class=\"session-list\">");
    for session in &sessions {
        list_html.push_str(&format!(
            r#"<li class="session-item">
                <a href="/chat/{key}" class="title">{title}</a>
                <span class="meta">{count} messages · {modified}</span>
            </li>"#,
            key = session.key,
            title = html_escape(&session.title),
            count = session.messages.len(),
            modified = session.modified.format("%Y-%m-%d %H:%M"),
        ));
    }
    list_html.push_str("</ul>");

    if sessions.is_empty() {
        list_html.push_str("<p class=\"empty\">No conversations yet.</p>");
    }

    Html(base_html("Conversations", &list_html))
}

// ============================================================================
// Transcript View Handler
// ============================================================================

pub async fn view_transcript(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let sessions_map = state.sessions_map();

    let session = match sessions_map.get(&key) {
        Some(s) => s,
        None => return (StatusCode::NOT_FOUND, "Conversation not found").into_response(),
    };

    Html(render_transcript(session)).into_response()
}

// ============================================================================
// Session API Handlers
// ============================================================================

/// POST /api/sessions: create a new conversation.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Response {
    match transcript::create_session(&req.title, &state.sessions_dir) {
        Ok(session) => Json(NewSessionResponse {
            key: session.key,
            title: session.title,
        })
        .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// POST /api/chat/{key}: append one message to a conversation.
pub async fn append_message(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<AppendMessageRequest>,
) -> Response {
    let sessions_map = state.sessions_map();

    let session = match sessions_map.get(&key) {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                format!("Conversation not found: {}", key),
            )
                .into_response();
        }
    };

    if req.content.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty message").into_response();
    }

    match transcript::append_message(session, req.role, &req.content, &state.sessions_dir) {
        Ok(message) => Json(message).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}
