//! Citation annotation and resolution.
//!
//! Assistant messages embed citation clauses of the form
//! `(Source: <file>, Pages: <tokens>) [#<doc>_<page>; ...]`. This module
//! rewrites those clauses into clickable anchors (the bracket groups are
//! metadata and are dropped from the visible output), decides which viewer a
//! clicked anchor resolves to, and serves the citation API routes.

use crate::documents;
use crate::models::{
    CitationErrorResponse, CitationRequest, CitationResponse, DocumentMeta, ResolveResponse,
};
use crate::transcript::html_escape;
use crate::{validate_path_within, AppState};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

#[cfg(test)]
#[path = "citations_test.rs"]
mod citations_test;

// ============================================================================
// Annotation
// ============================================================================

/// Rewrite every citation clause in a raw message into anchor markup.
///
/// Per clause: the filename becomes a hyperlink only when it is an absolute
/// http(s) URL, each page token becomes an anchor when a bracket ref (or an
/// inferred ref, for ranges) exists for it, and the bracket groups themselves
/// are consumed. Malformed tokens degrade to plain text; the function never
/// fails. Running it on its own output is not supported; the render pipeline
/// calls it exactly once per raw message.
pub fn annotate_citations(message: &str) -> String {
    let clause_re =
        Regex::new(r"\(Source:\s*(.+?),\s*Pages?:\s*([^)]+)\)((?:\s*\[#[^\]]*\])*)").unwrap();
    let bracket_re = Regex::new(r"\[([^\]]*)\]").unwrap();
    // A dash between page numbers may be a hyphen, en dash, or em dash.
    let range_re = Regex::new(r"^(\d+)\s*[-–—]\s*(\d+)$").unwrap();

    let mut out = String::with_capacity(message.len());
    let mut last = 0;
    for caps in clause_re.captures_iter(message) {
        let whole = caps.get(0).unwrap();
        out.push_str(&message[last..whole.start()]);

        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let pages = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let brackets = caps.get(3).map(|m| m.as_str()).unwrap_or("");

        let refs = page_ref_map(brackets, &bracket_re);
        let tokens: Vec<String> = pages
            .split(',')
            .map(|t| linkify_token(t.trim(), &refs, &range_re))
            .collect();

        out.push_str(&format!(
            "(Source: {}, Pages: {})",
            filename_html(filename),
            tokens.join(", ")
        ));
        last = whole.end();
    }
    out.push_str(&message[last..]);
    out
}

/// Flatten all bracket groups into page -> citation-id entries. Refs within a
/// group are separated by `;` or `,`; each is split on its last underscore.
/// Page keys are the raw page substrings, and a later occurrence of the same
/// key overwrites an earlier one.
fn page_ref_map(brackets: &str, bracket_re: &Regex) -> HashMap<String, String> {
    let mut refs = HashMap::new();
    for group in bracket_re.captures_iter(brackets) {
        for raw in group[1].split([';', ',']) {
            let trimmed = raw.trim();
            let id = trimmed.strip_prefix('#').unwrap_or(trimmed);
            if id.is_empty() {
                continue;
            }
            if let Some((_, page)) = id.rsplit_once('_') {
                if !page.is_empty() && page.chars().all(|c| c.is_ascii_digit()) {
                    refs.insert(page.to_string(), id.to_string());
                }
            }
        }
    }
    refs
}

/// Turn one page token into linked output: a range expands to one anchor per
/// page, a single page links if a ref exists, and anything unparseable is
/// emitted verbatim.
fn linkify_token(token: &str, refs: &HashMap<String, String>, range_re: &Regex) -> String {
    if let Some(caps) = range_re.captures(token) {
        let start_s = caps.get(1).unwrap().as_str();
        let end_s = caps.get(2).unwrap().as_str();
        if let (Ok(start), Ok(end)) = (start_s.parse::<u64>(), end_s.parse::<u64>()) {
            return expand_range(start_s, end_s, start, end, refs);
        }
        return html_escape(token);
    }
    if token.parse::<u64>().is_ok() {
        return anchor_if_ref(token, refs.get(token).map(String::as_str));
    }
    html_escape(token)
}

/// Expand a page range, ascending or descending, one anchor per page.
///
/// Pages with no bracket ref borrow a doc prefix from whichever endpoint has
/// one (the start endpoint is consulted first). Without a discoverable
/// prefix, unmatched pages stay plain text.
fn expand_range(
    start_s: &str,
    end_s: &str,
    start: u64,
    end: u64,
    refs: &HashMap<String, String>,
) -> String {
    let prefix = refs
        .get(start_s)
        .or_else(|| refs.get(end_s))
        .and_then(|id| id.rfind('_').map(|i| id[..=i].to_string()));

    let pages: Vec<u64> = if start <= end {
        (start..=end).collect()
    } else {
        (end..=start).rev().collect()
    };

    let mut parts = Vec::with_capacity(pages.len());
    for p in pages {
        let label = p.to_string();
        let part = match refs.get(&label) {
            Some(id) => anchor_if_ref(&label, Some(id)),
            None => match prefix {
                Some(ref pre) => {
                    let synthesized = format!("{}{}", pre, p);
                    anchor_if_ref(&label, Some(&synthesized))
                }
                None => label,
            },
        };
        parts.push(part);
    }
    parts.join(", ")
}

/// Wrap a page label in an anchor carrying the citation id, or return the
/// label unchanged when there is no id. A single leading `#` is stripped.
/// The id is not validated here; resolution failures surface at click time.
pub fn anchor_if_ref(page_label: &str, citation_id: Option<&str>) -> String {
    let id = match citation_id {
        Some(id) if !id.is_empty() => id,
        _ => return page_label.to_string(),
    };
    let id = id.strip_prefix('#').unwrap_or(id);
    format!(
        r##"<a href="#" class="citation-link" data-citation-id="{}">{}</a>"##,
        html_escape(id),
        page_label
    )
}

/// Render the source filename: a hyperlink for absolute http(s) URLs,
/// escaped plain text otherwise.
fn filename_html(filename: &str) -> String {
    if is_absolute_http_url(filename) {
        format!(
            r#"<a href="{0}" target="_blank" class="citation-source">{0}</a>"#,
            html_escape(filename)
        )
    } else {
        html_escape(filename)
    }
}

fn is_absolute_http_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Which viewer a citation click resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationAction {
    TextPopup,
    Enhanced,
}

/// Split a citation id on its last underscore into `(doc_id, page)`.
/// Ids without an underscore or with a non-numeric page part don't split;
/// callers fall back to the text-popup path for those.
pub fn split_citation_id(citation_id: &str) -> Option<(String, u64)> {
    let (doc_id, page) = citation_id.rsplit_once('_')?;
    if doc_id.is_empty() {
        return None;
    }
    let page = page.parse::<u64>().ok()?;
    Some((doc_id.to_string(), page))
}

/// The viewer decision table. The global flag gates everything; with it on,
/// a document is shown enhanced unless its metadata explicitly opts out.
/// Unknown documents get the optimistic enhanced attempt (the viewer falls
/// back to text on error).
pub fn decide_action(enhanced_enabled: bool, meta: Option<&DocumentMeta>) -> CitationAction {
    if !enhanced_enabled {
        return CitationAction::TextPopup;
    }
    match meta {
        None => CitationAction::Enhanced,
        Some(doc) => match doc.enhanced_citations {
            Some(false) => CitationAction::TextPopup,
            _ => CitationAction::Enhanced,
        },
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// POST /api/get_citation: fetch the cited text for one citation id.
pub async fn get_citation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CitationRequest>,
) -> Response {
    let (doc_id, page) = match split_citation_id(&req.citation_id) {
        Some(parts) => parts,
        None => {
            return error_json(
                StatusCode::BAD_REQUEST,
                format!("Malformed citation id: {}", req.citation_id),
            );
        }
    };

    let doc = match state.document_map().remove(&doc_id) {
        Some(d) => d,
        None => {
            return error_json(
                StatusCode::NOT_FOUND,
                format!("Unknown document: {}", doc_id),
            );
        }
    };

    let file_name = doc.file_name.clone();
    let documents_dir = state.documents_dir.clone();
    let db = state.db.clone();

    // PDF text extraction is blocking; keep it off the async runtime.
    let result =
        tokio::task::spawn_blocking(move || documents::cited_text(&doc, page, &documents_dir, &db))
            .await;

    match result {
        Ok(Ok(cited_text)) => Json(CitationResponse {
            cited_text,
            file_name,
            page_number: page,
        })
        .into_response(),
        Ok(Err(e)) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
        Err(e) => error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Task join error: {}", e),
        ),
    }
}

/// POST /api/resolve_citation: pick the viewer path for a clicked anchor.
pub async fn resolve_citation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CitationRequest>,
) -> Response {
    let response = match split_citation_id(&req.citation_id) {
        Some((doc_id, page)) => {
            let documents = state.document_map();
            let action = decide_action(state.enhanced_citations, documents.get(&doc_id));
            ResolveResponse {
                action: match action {
                    CitationAction::Enhanced => "enhanced".to_string(),
                    CitationAction::TextPopup => "text".to_string(),
                },
                doc_id: Some(doc_id),
                page: Some(page),
            }
        }
        None => ResolveResponse {
            action: "text".to_string(),
            doc_id: None,
            page: None,
        },
    };
    Json(response).into_response()
}

#[derive(Deserialize)]
pub struct ViewPdfQuery {
    pub doc_id: String,
    pub page: Option<u64>,
}

/// GET /view_pdf?doc_id=..&page=..: the document's PDF bytes.
///
/// The `X-Sub-PDF-Page` response header carries the page the viewer should
/// scroll to. The whole PDF is returned; no sub-PDF windowing is done.
pub async fn view_pdf(
    Query(query): Query<ViewPdfQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let doc = match state.document_map().remove(&query.doc_id) {
        Some(d) => d,
        None => return (StatusCode::NOT_FOUND, "Document not found").into_response(),
    };

    let pdf_name = match doc.pdf {
        Some(p) => p,
        None => return (StatusCode::NOT_FOUND, "Document has no attached PDF").into_response(),
    };

    let pdf_path =
        match validate_path_within(&state.documents_dir, &state.documents_dir.join(&pdf_name)) {
            Ok(p) => p,
            Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
        };

    let bytes = match tokio::fs::read(&pdf_path).await {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                format!("Cannot read PDF {}: {}", pdf_name, e),
            )
                .into_response();
        }
    };

    let page = query.page.unwrap_or(1);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    if let Ok(value) = HeaderValue::from_str(&page.to_string()) {
        headers.insert("x-sub-pdf-page", value);
    }
    (headers, bytes).into_response()
}

/// GET /api/documents: document metadata backing the client-side cache.
pub async fn document_metadata(State(state): State<Arc<AppState>>) -> Json<Vec<DocumentMeta>> {
    Json(state.load_documents())
}

fn error_json(status: StatusCode, error: String) -> Response {
    (status, Json(CitationErrorResponse { error })).into_response()
}
