//! Tests for citation annotation and resolution.

use super::*;
use chrono::Utc;
use std::path::PathBuf;

// ============================================================================
// Helpers
// ============================================================================

fn mock_doc(enhanced: Option<bool>) -> DocumentMeta {
    DocumentMeta {
        doc_id: "doc1".to_string(),
        path: PathBuf::from("doc1.md"),
        title: "Report".to_string(),
        file_name: "Report.pdf".to_string(),
        pdf: Some("Report.pdf".to_string()),
        enhanced_citations: enhanced,
        description: String::new(),
        modified: Utc::now(),
    }
}

fn anchor(label: &str, id: &str) -> String {
    anchor_if_ref(label, Some(id))
}

fn count_anchors(html: &str) -> usize {
    html.matches("data-citation-id").count()
}

// ============================================================================
// Single Page Tests
// ============================================================================

#[test]
fn test_single_page_with_ref() {
    let out = annotate_citations("(Source: F, Pages: 3) [#doc1_3]");
    assert_eq!(count_anchors(&out), 1, "got: {}", out);
    assert!(out.contains(r#"data-citation-id="doc1_3""#), "got: {}", out);
    assert!(out.contains(">3</a>"), "got: {}", out);
}

#[test]
fn test_single_page_without_ref_stays_plain() {
    // Page 9 has no bracket entry and is not part of a range: no anchor.
    let out = annotate_citations("(Source: F, Pages: 9) [#doc1_3]");
    assert_eq!(count_anchors(&out), 0, "got: {}", out);
    assert!(out.contains("Pages: 9)"), "got: {}", out);
}

#[test]
fn test_singular_page_keyword_normalized() {
    let out = annotate_citations("(Source: F, Page: 3) [#doc1_3]");
    assert!(out.contains("Pages:"), "got: {}", out);
    assert_eq!(count_anchors(&out), 1, "got: {}", out);
}

#[test]
fn test_leading_zero_page_matches_by_string() {
    // Keys compare as the raw page substrings, so "03" pairs with "#doc1_03".
    let out = annotate_citations("(Source: F, Pages: 03) [#doc1_03]");
    assert!(out.contains(r#"data-citation-id="doc1_03""#), "got: {}", out);
    assert!(out.contains(">03</a>"), "got: {}", out);
}

// ============================================================================
// Range Expansion Tests
// ============================================================================

#[test]
fn test_range_infers_interior_page() {
    let out = annotate_citations("(Source: F, Pages: 3-5) [#doc1_3] [#doc1_5]");
    assert_eq!(count_anchors(&out), 3, "got: {}", out);
    // Page 4 borrows the prefix from page 3's ref (start endpoint wins).
    assert!(out.contains(r#"data-citation-id="doc1_4""#), "got: {}", out);
    let p3 = out.find(r#""doc1_3""#).unwrap();
    let p4 = out.find(r#""doc1_4""#).unwrap();
    let p5 = out.find(r#""doc1_5""#).unwrap();
    assert!(p3 < p4 && p4 < p5, "ascending order, got: {}", out);
}

#[test]
fn test_descending_range_synthesizes_down() {
    let out = annotate_citations("(Source: F, Pages: 5-3) [#doc1_5]");
    assert_eq!(count_anchors(&out), 3, "got: {}", out);
    assert!(out.contains(r#"data-citation-id="doc1_4""#), "got: {}", out);
    assert!(out.contains(r#"data-citation-id="doc1_3""#), "got: {}", out);
    let p5 = out.find(r#""doc1_5""#).unwrap();
    let p4 = out.find(r#""doc1_4""#).unwrap();
    let p3 = out.find(r#""doc1_3""#).unwrap();
    assert!(p5 < p4 && p4 < p3, "descending order, got: {}", out);
}

#[test]
fn test_range_prefix_from_end_endpoint() {
    // Only the end endpoint has a ref; its prefix covers the rest.
    let out = annotate_citations("(Source: F, Pages: 1-3) [#r_3]");
    assert_eq!(count_anchors(&out), 3, "got: {}", out);
    assert!(out.contains(r#"data-citation-id="r_1""#), "got: {}", out);
    assert!(out.contains(r#"data-citation-id="r_2""#), "got: {}", out);
}

#[test]
fn test_range_start_endpoint_checked_before_end() {
    // Both endpoints resolve but to different docs; the start's prefix wins
    // for interior pages.
    let out = annotate_citations("(Source: F, Pages: 3-5) [#alpha_3] [#beta_5]");
    assert!(out.contains(r#"data-citation-id="alpha_4""#), "got: {}", out);
}

#[test]
fn test_range_without_resolvable_endpoints_stays_plain() {
    let out = annotate_citations("(Source: F, Pages: 7-9) [#doc1_3]");
    assert_eq!(count_anchors(&out), 0, "got: {}", out);
    assert!(out.contains("Pages: 7, 8, 9)"), "got: {}", out);
}

#[test]
fn test_en_dash_and_em_dash_ranges() {
    let out = annotate_citations("(Source: F, Pages: 3–4) [#doc1_3]");
    assert_eq!(count_anchors(&out), 2, "en dash, got: {}", out);
    let out = annotate_citations("(Source: F, Pages: 3—4) [#doc1_3]");
    assert_eq!(count_anchors(&out), 2, "em dash, got: {}", out);
}

#[test]
fn test_range_with_spaces_around_dash() {
    let out = annotate_citations("(Source: F, Pages: 3 - 4) [#doc1_3]");
    assert_eq!(count_anchors(&out), 2, "got: {}", out);
}

#[test]
fn test_single_page_range_expands_to_one() {
    let out = annotate_citations("(Source: F, Pages: 3-3) [#doc1_3]");
    assert_eq!(count_anchors(&out), 1, "got: {}", out);
}

// ============================================================================
// Bracket Group Tests
// ============================================================================

#[test]
fn test_brackets_dropped_from_output() {
    let out = annotate_citations("(Source: F, Pages: 3) [#doc1_3]");
    assert!(!out.contains("[#"), "bracket metadata leaked: {}", out);
    assert!(!out.contains(']'), "bracket metadata leaked: {}", out);
}

#[test]
fn test_later_bracket_wins_for_same_page() {
    let out = annotate_citations("(Source: F, Pages: 3) [#old_3] [#new_3]");
    assert!(out.contains(r#"data-citation-id="new_3""#), "got: {}", out);
    assert!(!out.contains("old_3"), "got: {}", out);
}

#[test]
fn test_refs_split_on_semicolon_and_comma() {
    let out = annotate_citations("(Source: F, Pages: 1, 2) [#a_1; a_2]");
    assert!(out.contains(r#"data-citation-id="a_1""#), "got: {}", out);
    assert!(out.contains(r#"data-citation-id="a_2""#), "got: {}", out);

    let out = annotate_citations("(Source: F, Pages: 1, 2) [#a_1, a_2]");
    assert!(out.contains(r#"data-citation-id="a_2""#), "got: {}", out);
}

#[test]
fn test_ref_without_underscore_is_ignored() {
    let out = annotate_citations("(Source: F, Pages: 3) [#nounderscore]");
    assert_eq!(count_anchors(&out), 0, "got: {}", out);
}

#[test]
fn test_ref_with_non_numeric_page_part_is_ignored() {
    let out = annotate_citations("(Source: F, Pages: 3) [#doc_abc]");
    assert_eq!(count_anchors(&out), 0, "got: {}", out);
}

#[test]
fn test_doc_id_with_underscores_splits_on_last() {
    let out = annotate_citations("(Source: F, Pages: 3) [#team_doc_v2_3]");
    assert!(
        out.contains(r#"data-citation-id="team_doc_v2_3""#),
        "got: {}",
        out
    );
}

#[test]
fn test_no_brackets_degrades_to_plain_pages() {
    let out = annotate_citations("(Source: F, Pages: 3, 4)");
    assert_eq!(count_anchors(&out), 0, "got: {}", out);
    assert!(out.contains("(Source: F, Pages: 3, 4)"), "got: {}", out);
}

// ============================================================================
// Filename Tests
// ============================================================================

#[test]
fn test_url_filename_becomes_hyperlink() {
    let out = annotate_citations("(Source: https://example.com/doc.pdf, Pages: 1) [#d_1]");
    assert!(
        out.contains(r#"href="https://example.com/doc.pdf""#),
        "got: {}",
        out
    );
    assert!(out.contains("citation-source"), "got: {}", out);
}

#[test]
fn test_plain_filename_stays_text() {
    let out = annotate_citations("(Source: Report.pdf, Pages: 1) [#d_1]");
    assert!(out.contains("Source: Report.pdf,"), "got: {}", out);
    assert!(!out.contains(r#"href="Report.pdf""#), "got: {}", out);
}

#[test]
fn test_non_http_scheme_not_linked() {
    let out = annotate_citations("(Source: ftp://example.com/x.pdf, Pages: 1) [#d_1]");
    assert!(!out.contains("citation-source"), "got: {}", out);
}

#[test]
fn test_filename_html_is_escaped() {
    let out = annotate_citations("(Source: a<b>.pdf, Pages: 1) [#d_1]");
    assert!(out.contains("a&lt;b&gt;.pdf"), "got: {}", out);
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[test]
fn test_unparseable_tokens_pass_through() {
    let out = annotate_citations("(Source: F, Pages: vii, 3-x, 4) [#d_4]");
    assert!(out.contains("vii"), "got: {}", out);
    assert!(out.contains("3-x"), "got: {}", out);
    assert_eq!(count_anchors(&out), 1, "only page 4 links, got: {}", out);
}

#[test]
fn test_message_without_citations_unchanged() {
    let msg = "No citations here, just (parentheses) and [brackets].";
    assert_eq!(annotate_citations(msg), msg);
}

#[test]
fn test_empty_message() {
    assert_eq!(annotate_citations(""), "");
}

#[test]
fn test_surrounding_text_preserved() {
    let out = annotate_citations("Before. (Source: F, Pages: 3) [#d_3] After.");
    assert!(out.starts_with("Before. "), "got: {}", out);
    assert!(out.ends_with(" After."), "got: {}", out);
}

#[test]
fn test_multiple_clauses_annotated_independently() {
    let out = annotate_citations(
        "(Source: A, Pages: 1) [#a_1] and (Source: B, Pages: 2) [#b_2]",
    );
    assert!(out.contains(r#"data-citation-id="a_1""#), "got: {}", out);
    assert!(out.contains(r#"data-citation-id="b_2""#), "got: {}", out);
    assert_eq!(count_anchors(&out), 2, "got: {}", out);
}

// ============================================================================
// End-to-End Annotation
// ============================================================================

#[test]
fn test_e2e_mixed_tokens() {
    let out =
        annotate_citations("See (Source: Report.pdf, Pages: 1, 3-4) [#r_1] [#r_3] [#r_4]");
    let expected = format!(
        "See (Source: Report.pdf, Pages: {}, {}, {})",
        anchor("1", "r_1"),
        anchor("3", "r_3"),
        anchor("4", "r_4"),
    );
    assert_eq!(out, expected);
}

// ============================================================================
// Anchor Construction Tests
// ============================================================================

#[test]
fn test_anchor_without_id_is_label_only() {
    assert_eq!(anchor_if_ref("3", None), "3");
    assert_eq!(anchor_if_ref("3", Some("")), "3");
}

#[test]
fn test_anchor_strips_leading_hash() {
    let out = anchor_if_ref("3", Some("#doc1_3"));
    assert!(out.contains(r#"data-citation-id="doc1_3""#), "got: {}", out);
    assert!(out.contains(">3</a>"), "got: {}", out);
}

#[test]
fn test_anchor_escapes_id() {
    let out = anchor_if_ref("3", Some(r#"bad"id_3"#));
    assert!(out.contains("bad&quot;id_3"), "got: {}", out);
}

// ============================================================================
// Citation Id Splitting Tests
// ============================================================================

#[test]
fn test_split_citation_id_basic() {
    assert_eq!(
        split_citation_id("doc1_3"),
        Some(("doc1".to_string(), 3))
    );
}

#[test]
fn test_split_citation_id_uses_last_underscore() {
    assert_eq!(
        split_citation_id("team_doc_v2_12"),
        Some(("team_doc_v2".to_string(), 12))
    );
}

#[test]
fn test_split_citation_id_rejects_malformed() {
    assert_eq!(split_citation_id("nounderscore"), None);
    assert_eq!(split_citation_id("doc_abc"), None);
    assert_eq!(split_citation_id("_3"), None);
    assert_eq!(split_citation_id(""), None);
}

// ============================================================================
// Viewer Decision Table Tests
// ============================================================================

#[test]
fn test_global_flag_off_always_text() {
    assert_eq!(decide_action(false, None), CitationAction::TextPopup);
    assert_eq!(
        decide_action(false, Some(&mock_doc(Some(true)))),
        CitationAction::TextPopup
    );
}

#[test]
fn test_unknown_document_is_optimistically_enhanced() {
    assert_eq!(decide_action(true, None), CitationAction::Enhanced);
}

#[test]
fn test_document_opt_out_forces_text() {
    assert_eq!(
        decide_action(true, Some(&mock_doc(Some(false)))),
        CitationAction::TextPopup
    );
}

#[test]
fn test_document_opt_in_or_silent_is_enhanced() {
    assert_eq!(
        decide_action(true, Some(&mock_doc(Some(true)))),
        CitationAction::Enhanced
    );
    assert_eq!(
        decide_action(true, Some(&mock_doc(None))),
        CitationAction::Enhanced
    );
}
