//! Document store: descriptor loading and cited-text extraction.
//!
//! Each document lives in the documents directory as a PDF plus a markdown
//! descriptor with a small frontmatter block (`title:`, `file_name:`,
//! `pdf:`, `enhanced:`). Cited text is pulled out of the PDF one page at a
//! time, preferring `pdftotext` with a page window and falling back to the
//! native `pdf-extract` crate, and cached in sled keyed by citation id.
//! A cache entry is invalidated when the PDF's content hash changes.

use crate::models::DocumentMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

const CITED_TEXT_TREE: &str = "cited_text";

// ============================================================================
// Descriptor Parsing
// ============================================================================

#[derive(Debug, Default)]
pub struct Descriptor {
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub pdf: Option<String>,
    pub enhanced: Option<bool>,
}

/// Parse the frontmatter of a document descriptor. Returns the parsed fields
/// and the body (free-form description). Files without a frontmatter block
/// are all body.
pub fn parse_descriptor(content: &str) -> (Descriptor, String) {
    let mut desc = Descriptor::default();
    let lines: Vec<&str> = content.lines().collect();

    if lines.is_empty() || lines[0].trim() != "---" {
        return (desc, content.to_string());
    }

    let end_idx = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.trim() == "---")
        .map(|(i, _)| i);

    let end_idx = match end_idx {
        Some(i) => i,
        None => return (desc, content.to_string()),
    };

    for line in &lines[1..end_idx] {
        if let Some((key, value)) = line.trim().split_once(':') {
            let value = value.trim();
            match key.trim().to_lowercase().as_str() {
                "title" => desc.title = Some(value.to_string()),
                "file_name" | "filename" => desc.file_name = Some(value.to_string()),
                "pdf" => {
                    if !value.is_empty() {
                        desc.pdf = Some(value.to_string());
                    }
                }
                "enhanced" | "enhanced_citations" => {
                    desc.enhanced = Some(value.eq_ignore_ascii_case("true"));
                }
                _ => {}
            }
        }
    }

    let body = lines[end_idx + 1..].join("\n");
    (desc, body)
}

// ============================================================================
// Document Loading
// ============================================================================

/// Stable id for a document, derived from its descriptor path.
pub fn generate_doc_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn load_document(path: &PathBuf, documents_dir: &PathBuf) -> Option<DocumentMeta> {
    let content = fs::read_to_string(path).ok()?;
    let relative = path.strip_prefix(documents_dir).ok()?.to_path_buf();
    let doc_id = generate_doc_id(&relative);

    let (desc, body) = parse_descriptor(&content);

    let title = desc.title.unwrap_or_else(|| {
        relative
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string())
    });
    let file_name = desc
        .file_name
        .or_else(|| desc.pdf.clone())
        .unwrap_or_else(|| title.clone());

    let metadata = fs::metadata(path).ok()?;
    let modified: DateTime<Utc> = metadata.modified().ok()?.into();

    Some(DocumentMeta {
        doc_id,
        path: relative,
        title,
        file_name,
        pdf: desc.pdf,
        enhanced_citations: desc.enhanced,
        description: body.trim().to_string(),
        modified,
    })
}

pub fn load_all_documents(documents_dir: &PathBuf) -> Vec<DocumentMeta> {
    use rayon::prelude::*;

    let paths: Vec<PathBuf> = WalkDir::new(documents_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "md").unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect();

    let mut documents: Vec<DocumentMeta> = paths
        .par_iter()
        .filter_map(|path| load_document(path, documents_dir))
        .collect();

    documents.sort_by(|a, b| b.modified.cmp(&a.modified));
    documents
}

// ============================================================================
// PDF Hashing for Cache Validation
// ============================================================================

/// SHA256 of the first 64KB of the PDF, sufficient for change detection.
fn hash_pdf(path: &Path) -> Result<String, String> {
    let mut file = fs::File::open(path).map_err(|e| format!("Cannot open PDF: {}", e))?;
    let mut buf = vec![0u8; 65536];
    let n = file
        .read(&mut buf)
        .map_err(|e| format!("Cannot read PDF: {}", e))?;
    let mut hasher = Sha256::new();
    hasher.update(&buf[..n]);
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Page Text Extraction
// ============================================================================

/// Run `pdftotext` windowed to a single page and return stdout.
fn run_pdftotext_page(path: &Path, page: u64) -> Result<String, String> {
    let page_arg = page.to_string();
    let output = Command::new("pdftotext")
        .args(["-f", &page_arg, "-l", &page_arg])
        .arg(path.as_os_str())
        .arg("-")
        .output()
        .map_err(|e| format!("Failed to run pdftotext: {}. Is poppler installed?", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("pdftotext failed: {}", stderr));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| format!("pdftotext output not valid UTF-8: {}", e))
}

/// Extract one page with the native `pdf-extract` crate: full-document text
/// split at form-feed page breaks.
fn extract_page_native(path: &Path, page: u64) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|e| format!("Cannot read PDF: {}", e))?;
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| format!("pdf-extract failed: {}", e))?;
    page_from_text(&text, page)
}

/// Pull one page out of extracted full text using form-feed page breaks.
/// Text without page breaks is returned whole.
fn page_from_text(text: &str, page: u64) -> Result<String, String> {
    let pages: Vec<&str> = text.split('\x0c').collect();
    if pages.len() <= 1 {
        return Ok(text.to_string());
    }
    let idx = page.saturating_sub(1) as usize;
    pages
        .get(idx)
        .map(|s| s.to_string())
        .ok_or_else(|| format!("Page {} out of range ({} pages)", page, pages.len()))
}

// ============================================================================
// Sled Cache Operations
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CachedPage {
    citation_id: String,
    cited_text: String,
    pdf_hash: String,
}

fn load_cached_page(db: &sled::Db, citation_id: &str) -> Option<CachedPage> {
    let tree = db.open_tree(CITED_TEXT_TREE).ok()?;
    let data = tree.get(citation_id.as_bytes()).ok()??;
    serde_json::from_slice(&data).ok()
}

fn save_cached_page(db: &sled::Db, cached: &CachedPage) -> Result<(), String> {
    let tree = db
        .open_tree(CITED_TEXT_TREE)
        .map_err(|e| format!("Cannot open cited_text tree: {}", e))?;
    let json = serde_json::to_vec(cached).map_err(|e| format!("JSON serialize error: {}", e))?;
    tree.insert(cached.citation_id.as_bytes(), json)
        .map_err(|e| format!("Sled insert error: {}", e))?;
    Ok(())
}

// ============================================================================
// Cited Text
// ============================================================================

/// The text of one cited page, extracted on demand and cached.
pub fn cited_text(
    doc: &DocumentMeta,
    page: u64,
    documents_dir: &Path,
    db: &sled::Db,
) -> Result<String, String> {
    let pdf_name = doc
        .pdf
        .as_deref()
        .ok_or_else(|| "Document has no attached PDF".to_string())?;

    let pdf_path = documents_dir.join(pdf_name);
    if !pdf_path.exists() {
        return Err(format!("PDF file not found: {}", pdf_name));
    }

    let current_hash = hash_pdf(&pdf_path)?;
    let citation_id = format!("{}_{}", doc.doc_id, page);

    if let Some(cached) = load_cached_page(db, &citation_id) {
        if cached.pdf_hash == current_hash {
            return Ok(cached.cited_text);
        }
    }

    let text = run_pdftotext_page(&pdf_path, page).or_else(|_| extract_page_native(&pdf_path, page))?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(format!("No text on page {} of {}", page, pdf_name));
    }

    save_cached_page(
        db,
        &CachedPage {
            citation_id,
            cited_text: text.clone(),
            pdf_hash: current_hash,
        },
    )?;

    Ok(text)
}

// ============================================================================
// Tests
// ============================================================================
