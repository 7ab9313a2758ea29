//! Search result rendering
//!
//! Plain mode hands results back untouched. Interactive mode attaches the
//! per-result actions and a self-contained HTML carousel addressed by a
//! content-derived `ui://` URI.

use std::fmt::Write as _;

use reqwest::Url;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::web::SearchResult;

/// URI scheme prefix for rendered result documents
const RESOURCE_URI_PREFIX: &str = "ui://search-gateway/results-";

/// Hex characters of the content hash kept in the URI
const URI_HASH_LEN: usize = 16;

/// Preferred frame size hint for hosts embedding the document
pub const PREFERRED_FRAME_SIZE: [&str; 2] = ["100%", "150px"];

/// How search results are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Structured results only
    Plain,
    /// Results with actions and an HTML presentation
    Interactive,
}

/// Action offered next to a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AffordanceAction {
    /// Run `extract_webpage` on the result URL
    Extract,
    /// Open the result URL
    Open,
}

/// An action bound to one result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Affordance {
    pub action: AffordanceAction,
    pub label: &'static str,
    /// Tool invoked by the action, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<&'static str>,
    pub url: String,
}

/// A result with its actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractiveItem {
    #[serde(flatten)]
    pub result: SearchResult,
    pub affordances: Vec<Affordance>,
}

/// Interactive presentation of a result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractiveResults {
    pub query: String,
    pub items: Vec<InteractiveItem>,
    /// Stable resource URI of `html`
    pub uri: String,
    /// Self-contained HTML document
    #[serde(skip)]
    pub html: String,
}

/// Output of [`render`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedPayload {
    Plain(Vec<SearchResult>),
    Interactive(InteractiveResults),
}

/// Render a result page
///
/// Never reorders or drops results. Identical input always produces an
/// identical payload.
#[must_use]
pub fn render(query: &str, results: Vec<SearchResult>, mode: RenderMode) -> RenderedPayload {
    match mode {
        RenderMode::Plain => RenderedPayload::Plain(results),
        RenderMode::Interactive => {
            let html = results_html(&results);
            let uri = resource_uri(query, &results);
            let items = results
                .into_iter()
                .map(|result| InteractiveItem {
                    affordances: affordances(&result.url),
                    result,
                })
                .collect();

            RenderedPayload::Interactive(InteractiveResults {
                query: query.to_string(),
                items,
                uri,
                html,
            })
        }
    }
}

fn affordances(url: &str) -> Vec<Affordance> {
    vec![
        Affordance {
            action: AffordanceAction::Extract,
            label: "Extract",
            tool: Some("extract_webpage"),
            url: url.to_string(),
        },
        Affordance {
            action: AffordanceAction::Open,
            label: "Open",
            tool: None,
            url: url.to_string(),
        },
    ]
}

/// Text transcript: `title\nurl\nsnippet` blocks separated by a blank line
///
/// Empty for an empty result set.
#[must_use]
pub fn plain_text(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("{}\n{}\n{}", r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Content-derived URI for a rendered page
#[must_use]
pub fn resource_uri(query: &str, results: &[SearchResult]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    for r in results {
        hasher.update([0u8]);
        hasher.update(r.position.to_be_bytes());
        hasher.update(r.url.as_bytes());
        hasher.update([0u8]);
        hasher.update(r.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(r.snippet.as_bytes());
    }
    let hash = hex::encode(hasher.finalize());

    format!("{RESOURCE_URI_PREFIX}{}", &hash[..URI_HASH_LEN])
}

/// Escape text for HTML element content and quoted attributes
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

const EMPTY_DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>
*{box-sizing:border-box;margin:0;padding:0}
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;background:#f5f5f5;min-height:100vh;display:flex;align-items:center;justify-content:center;padding:20px;color:#666}
.empty{text-align:center}
.empty-icon{font-size:48px;margin-bottom:12px;opacity:.5}
.empty-text{font-size:16px}
</style>
</head>
<body>
<div class="empty"><div class="empty-icon">&#x1F50D;</div><div class="empty-text">No results</div></div>
</body>
</html>
"#;

const CAROUSEL_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<style>
*{margin:0;padding:0;box-sizing:border-box}
html,body{height:100%;overflow:hidden}
.frame{padding:6px;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;height:150px;overflow:hidden}
.row{display:flex;gap:6px;align-items:center;height:100%}
.nav{width:20px;height:20px;min-width:20px;border-radius:50%;border:1px solid #ddd;background:#f5f5f5;cursor:pointer;font-size:10px}
#carousel{display:flex;gap:8px;overflow-x:auto;flex:1;scroll-behavior:smooth;scrollbar-width:none;align-items:center}
.card{flex:0 0 200px;height:100px;background:#f8f9fa;border:1px solid #e9ecef;border-radius:6px;padding:6px 8px;display:flex;flex-direction:column}
.meta{display:flex;align-items:center;gap:4px;margin-bottom:3px}
.meta img{width:12px;height:12px}
.domain{font-size:9px;color:#6c757d;flex:1;overflow:hidden;text-overflow:ellipsis;white-space:nowrap}
.rank{font-size:8px;font-weight:600;color:#0d6efd;background:#e7f1ff;padding:1px 4px;border-radius:8px}
.title{font-size:10px;font-weight:600;color:#212529;text-decoration:none;margin-bottom:2px;overflow:hidden;line-height:1.2;max-height:2.4em}
.snippet{font-size:9px;color:#6c757d;flex:1;overflow:hidden;line-height:1.2;max-height:2.4em}
.actions{display:flex;gap:4px;margin-top:2px}
.actions button,.actions a{flex:1;padding:2px 4px;border-radius:3px;font-size:8px;font-weight:500;cursor:pointer;text-align:center;text-decoration:none;border:none}
.actions button{background:#0d6efd;color:#fff}
.actions a{background:#e9ecef;color:#495057}
</style>
</head>
<body>
<div class="frame"><div class="row">
<button class="nav" onclick="scrollCarousel(-1)">&#x25C0;</button>
<div id="carousel">"#;

const CAROUSEL_TAIL: &str = r#"</div>
<button class="nav" onclick="scrollCarousel(1)">&#x25B6;</button>
</div></div>
<script>
const carousel = document.getElementById('carousel');
function scrollCarousel(dir) { carousel.scrollBy({ left: dir * 210, behavior: 'smooth' }); }
function extractContent(url) {
  if (window.parent) {
    window.parent.postMessage({ type: 'tool', payload: { toolName: 'extract_webpage', params: { url: url } } }, '*');
  }
}
</script>
</body>
</html>
"#;

/// HTML carousel with one card per result
#[must_use]
pub fn results_html(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return EMPTY_DOCUMENT.to_string();
    }

    let mut html = String::from(CAROUSEL_HEAD);
    for r in results {
        let url = escape_html(&r.url);
        let host = domain(&r.url);
        let favicon = format!(
            "https://www.google.com/s2/favicons?domain={}&sz=32",
            escape_html(&host)
        );
        // Writing into a String cannot fail
        let _ = write!(
            html,
            concat!(
                r#"<div class="card">"#,
                r#"<div class="meta"><img src="{favicon}" alt="" onerror="this.style.visibility='hidden'">"#,
                r#"<span class="domain">{domain}</span><span class="rank">#{position}</span></div>"#,
                r#"<a class="title" href="{url}" target="_blank" rel="noopener">{title}</a>"#,
                r#"<p class="snippet">{snippet}</p>"#,
                r#"<div class="actions">"#,
                r#"<button data-url="{url}" onclick="extractContent(this.dataset.url)">Extract</button>"#,
                r#"<a href="{url}" target="_blank" rel="noopener">Open</a>"#,
                r#"</div></div>"#,
            ),
            favicon = escape_html(&favicon),
            domain = escape_html(&host),
            position = r.position,
            url = url,
            title = escape_html(&r.title),
            snippet = escape_html(&r.snippet),
        );
    }
    html.push_str(CAROUSEL_TAIL);
    html
}
