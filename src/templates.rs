//! HTML templates and styling.
//!
//! CSS, the citation click script, and the HTML generation functions for the
//! web interface. Pages are assembled server-side as strings; the only
//! client-side script is the citation viewer dispatch and the composer.

use crate::models::{ChatSession, MessageRole};
use crate::transcript::{html_escape, render_message_html};

// ============================================================================
// CSS Styles
// ============================================================================

pub const STYLE: &str = r#"
:root {
    --bg: #f7f7f5;
    --panel: #ffffff;
    --fg: #2d2d2a;
    --muted: #8a8a85;
    --border: #e4e4df;
    --link: #1f6feb;
    --link-hover: #0a4fb5;
    --user-bg: #eef3fb;
    --assistant-bg: #ffffff;
    --accent: #f0ede4;
    --danger: #b42318;
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
    line-height: 1.6;
    color: var(--fg);
    background: var(--bg);
}

.container { max-width: 820px; margin: 0 auto; padding: 1rem; }

a { color: var(--link); text-decoration: none; }
a:hover { color: var(--link-hover); text-decoration: underline; }

h1 { font-size: 1.4rem; margin: 1rem 0; }

.nav-bar {
    position: sticky;
    top: 0;
    background: var(--bg);
    border-bottom: 1px solid var(--border);
    padding: 0.5rem 1rem;
    display: flex;
    gap: 1rem;
    align-items: center;
    z-index: 100;
}

.session-list { list-style: none; }
.session-item {
    display: flex;
    justify-content: space-between;
    padding: 0.6rem 0.4rem;
    border-bottom: 1px solid var(--border);
}
.session-item .meta { color: var(--muted); font-size: 0.85rem; }
.empty { color: var(--muted); margin-top: 1rem; }

.message {
    background: var(--assistant-bg);
    border: 1px solid var(--border);
    border-radius: 8px;
    padding: 0.75rem 1rem;
    margin: 0.75rem 0;
}
.message.user { background: var(--user-bg); }
.message .who {
    font-size: 0.75rem;
    text-transform: uppercase;
    letter-spacing: 0.05em;
    color: var(--muted);
    margin-bottom: 0.25rem;
}
.message .body p { margin: 0.4rem 0; }
.message .body pre {
    background: var(--accent);
    padding: 0.5rem 0.75rem;
    border-radius: 6px;
    overflow-x: auto;
}

a.citation-link {
    border-bottom: 1px dotted var(--link);
    cursor: pointer;
}

.composer { display: flex; gap: 0.5rem; margin: 1rem 0; }
.composer textarea {
    flex: 1;
    min-height: 3rem;
    padding: 0.5rem 0.75rem;
    border: 1px solid var(--border);
    border-radius: 6px;
    font-family: inherit;
    font-size: 0.95rem;
    resize: vertical;
}
.composer button {
    padding: 0.5rem 1rem;
    border: 1px solid var(--border);
    border-radius: 6px;
    background: var(--panel);
    cursor: pointer;
}
.composer button:hover { background: var(--accent); }

/* Citation modal */
.citation-modal-backdrop {
    position: fixed;
    inset: 0;
    background: rgba(0, 0, 0, 0.35);
    display: flex;
    align-items: center;
    justify-content: center;
    z-index: 200;
}
.citation-modal {
    background: var(--panel);
    border-radius: 8px;
    max-width: 640px;
    width: 90%;
    max-height: 80vh;
    display: flex;
    flex-direction: column;
    box-shadow: 0 12px 32px rgba(0, 0, 0, 0.25);
}
.citation-modal header {
    display: flex;
    justify-content: space-between;
    align-items: center;
    padding: 0.6rem 1rem;
    border-bottom: 1px solid var(--border);
}
.citation-modal header .close {
    background: none;
    border: none;
    font-size: 1.1rem;
    cursor: pointer;
    color: var(--muted);
}
.citation-modal .content {
    padding: 1rem;
    overflow-y: auto;
    white-space: pre-wrap;
}
.citation-modal embed { width: 100%; height: 70vh; }

/* Toast */
#toast {
    position: fixed;
    bottom: 1.5rem;
    left: 50%;
    transform: translateX(-50%);
    background: var(--fg);
    color: var(--bg);
    padding: 0.5rem 1rem;
    border-radius: 6px;
    font-size: 0.9rem;
    opacity: 0;
    transition: opacity 0.2s ease;
    pointer-events: none;
    z-index: 300;
}
#toast.visible { opacity: 1; }
"#;

// ============================================================================
// Citation Viewer Script
// ============================================================================

/// Client-side dispatch for citation anchors.
///
/// Each click takes a fresh generation token; a response belonging to a
/// superseded click is dropped instead of overwriting the modal. The enhanced
/// path falls back to the text popup when its PDF fetch fails.
pub const CITATION_JS: &str = r#"
(function () {
    let generation = 0;

    function showToast(message) {
        let toast = document.getElementById('toast');
        if (!toast) {
            toast = document.createElement('div');
            toast.id = 'toast';
            document.body.appendChild(toast);
        }
        toast.textContent = message;
        toast.classList.add('visible');
        clearTimeout(toast._timer);
        toast._timer = setTimeout(function () {
            toast.classList.remove('visible');
        }, 4000);
    }

    function closeModal() {
        const backdrop = document.getElementById('citation-modal-backdrop');
        if (backdrop) backdrop.remove();
    }

    function openModal(titleHtml, bodyNode) {
        closeModal();
        const backdrop = document.createElement('div');
        backdrop.id = 'citation-modal-backdrop';
        backdrop.className = 'citation-modal-backdrop';

        const modal = document.createElement('div');
        modal.className = 'citation-modal';

        const header = document.createElement('header');
        const title = document.createElement('span');
        title.textContent = titleHtml;
        const close = document.createElement('button');
        close.className = 'close';
        close.textContent = '×';
        close.addEventListener('click', closeModal);
        header.appendChild(title);
        header.appendChild(close);

        const content = document.createElement('div');
        content.className = 'content';
        content.appendChild(bodyNode);

        modal.appendChild(header);
        modal.appendChild(content);
        backdrop.appendChild(modal);
        backdrop.addEventListener('click', function (ev) {
            if (ev.target === backdrop) closeModal();
        });
        document.body.appendChild(backdrop);
    }

    function showTextCitation(citationId, gen) {
        fetch('/api/get_citation', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ citation_id: citationId })
        })
            .then(function (resp) {
                return resp.json().then(function (data) {
                    return { ok: resp.ok, data: data };
                });
            })
            .then(function (result) {
                if (gen !== generation) return;
                if (!result.ok || result.data.error) {
                    showToast(result.data.error || 'Unable to load citation');
                    return;
                }
                const body = document.createElement('div');
                body.textContent = result.data.cited_text;
                openModal(
                    result.data.file_name + ' · page ' + result.data.page_number,
                    body
                );
            })
            .catch(function () {
                if (gen === generation) showToast('Unable to load citation');
            });
    }

    function showEnhancedCitation(docId, page, citationId, gen) {
        fetch('/view_pdf?doc_id=' + encodeURIComponent(docId) + '&page=' + page)
            .then(function (resp) {
                if (!resp.ok) throw new Error('pdf fetch failed');
                const subPage = resp.headers.get('X-Sub-PDF-Page') || page;
                return resp.blob().then(function (blob) {
                    return { blob: blob, subPage: subPage };
                });
            })
            .then(function (result) {
                if (gen !== generation) return;
                const embed = document.createElement('embed');
                embed.type = 'application/pdf';
                embed.src = URL.createObjectURL(result.blob) + '#page=' + result.subPage;
                openModal('Source document · page ' + result.subPage, embed);
            })
            .catch(function () {
                // PDF failure is silent; the text path shows its own errors.
                if (gen === generation) showTextCitation(citationId, gen);
            });
    }

    document.addEventListener('click', function (ev) {
        const link = ev.target.closest('a.citation-link');
        if (!link) return;
        ev.preventDefault();

        const citationId = link.dataset.citationId;
        if (!citationId) {
            showToast('Citation link is missing its reference');
            return;
        }

        const gen = ++generation;
        fetch('/api/resolve_citation', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ citation_id: citationId })
        })
            .then(function (resp) { return resp.json(); })
            .then(function (data) {
                if (gen !== generation) return;
                if (data.action === 'enhanced' && data.doc_id) {
                    showEnhancedCitation(data.doc_id, data.page, citationId, gen);
                } else {
                    showTextCitation(citationId, gen);
                }
            })
            .catch(function () {
                if (gen === generation) showTextCitation(citationId, gen);
            });
    });
})();
"#;

// ============================================================================
// Page Templates
// ============================================================================

pub fn nav_bar() -> String {
    r#"<div class="nav-bar"><a href="/">Conversations</a></div>"#.to_string()
}

pub fn base_html(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
    {nav}
    <div class="container">
    {content}
    </div>
    <script>{script}</script>
</body>
</html>"#,
        title = html_escape(title),
        style = STYLE,
        nav = nav_bar(),
        content = content,
        script = CITATION_JS,
    )
}

/// Full transcript page for one session: rendered messages plus the composer.
pub fn render_transcript(session: &ChatSession) -> String {
    let mut body = format!("<h1>{}</h1><div id=\"transcript\">", html_escape(&session.title));

    for message in &session.messages {
        let role_class = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        body.push_str(&format!(
            r#"<div class="message {role}">
                <div class="who">{role} · {when}</div>
                <div class="body">{html}</div>
            </div>"#,
            role = role_class,
            when = message.timestamp.format("%Y-%m-%d %H:%M"),
            html = render_message_html(&message.content),
        ));
    }
    body.push_str("</div>");

    let key_json = serde_json::to_string(&session.key).unwrap_or_else(|_| "\"\"".to_string());
    body.push_str(&format!(
        r#"<form class="composer" id="composer">
            <textarea id="composer-text" placeholder="Send a message"></textarea>
            <button type="submit">Send</button>
        </form>
        <script>
        (function () {{
            const sessionKey = {key_json};
            document.getElementById('composer').addEventListener('submit', function (ev) {{
                ev.preventDefault();
                const text = document.getElementById('composer-text').value;
                if (!text.trim()) return;
                fetch('/api/chat/' + sessionKey, {{
                    method: 'POST',
                    headers: {{ 'Content-Type': 'application/json' }},
                    body: JSON.stringify({{ role: 'user', content: text }})
                }}).then(function (resp) {{
                    if (resp.ok) {{ window.location.reload(); }}
                }});
            }});
        }})();
        </script>"#,
        key_json = key_json,
    ));

    base_html(&session.title, &body)
}
