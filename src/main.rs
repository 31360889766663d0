//! SimpleChat - chat transcripts with document-grounded citations.
//!
//! Main entry point for the web server. Route layout:
//!
//! - `/` and `/chat/{key}`: session index and transcript views
//! - `/api/sessions`, `/api/chat/{key}`: session creation and message append
//! - `/api/get_citation`, `/api/resolve_citation`, `/view_pdf`,
//!   `/api/documents`: the citation API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use simplechat::{citations, handlers, AppState, DOCUMENTS_DIR, SESSIONS_DIR};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let state = Arc::new(AppState::new());
    let enhanced = state.enhanced_citations;

    let app = Router::new()
        // Transcript routes
        .route("/", get(handlers::index))
        .route("/chat/{key}", get(handlers::view_transcript))
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/chat/{key}", post(handlers::append_message))
        // Citation routes
        .route("/api/get_citation", post(citations::get_citation))
        .route("/api/resolve_citation", post(citations::resolve_citation))
        .route("/view_pdf", get(citations::view_pdf))
        .route("/api/documents", get(citations::document_metadata))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("Failed to bind to port 3000");

    println!("SimpleChat server running at http://127.0.0.1:3000");
    println!("Sessions directory: {}", SESSIONS_DIR);
    println!("Documents directory: {}", DOCUMENTS_DIR);

    if enhanced {
        println!("Enhanced citations: ENABLED");
    } else {
        println!("Enhanced citations: DISABLED (CHAT_ENHANCED_CITATIONS set off)");
    }

    axum::serve(listener, app).await.expect("Server error");
}
