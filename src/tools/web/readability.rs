//! Readable text extraction from HTML
//!
//! Two stages:
//! 1. Structural: parse the document, drop boilerplate subtrees (scripts,
//!    navigation, ads, cookie banners, ...), pick the main content container
//!    and walk it emitting one line per block element.
//! 2. Fallback: when the structural stage yields no text, strip tags with
//!    regexes and keep whatever text remains.
//!
//! Extraction never fails; partial text beats no text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Containers holding less text than this are not trusted as main content
const MIN_MAIN_CONTENT_CHARS: usize = 200;

/// Nesting depth past which subtrees are flattened instead of walked
const MAX_WALK_DEPTH: usize = 256;

/// Elements never holding readable content
const SKIP_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed", "svg", "canvas",
    "nav", "header", "footer", "aside", "form", "button", "select", "head", "title", "meta",
    "link", "dialog",
];

/// Elements that start a new line
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul",
    "ol", "br", "hr", "tr", "table", "thead", "tbody", "blockquote", "pre", "dl", "dt", "dd",
    "figure", "figcaption", "address", "details", "summary", "body",
];

/// `id`/`class` tokens marking boilerplate containers
const BOILERPLATE_TOKENS: &[&str] = &[
    "ad", "ads", "advert", "adverts", "advertisement", "sponsored", "banner", "cookie",
    "cookies", "consent", "gdpr", "sidebar", "menu", "navbar", "nav", "breadcrumb",
    "breadcrumbs", "share", "sharing", "social", "popup", "modal", "newsletter", "subscribe",
    "promo", "related", "comments", "comment", "footer", "header", "skip-link",
];

/// ARIA roles marking boilerplate containers
const BOILERPLATE_ROLES: &[&str] = &[
    "navigation", "banner", "contentinfo", "complementary", "search", "dialog", "alertdialog",
];

/// Main content candidates, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".article-content",
    ".article-body",
    ".entry-content",
    ".story-body",
    "#article-body",
    "#content",
];

static SCRIPT_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<!--.*?-->")
        .expect("valid regex")
});

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|tr|h[1-6]|section|article|blockquote|pre|table|ul|ol)\b[^>]*>")
        .expect("valid regex")
});

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]{1,6}|[0-9]{1,7});").expect("valid regex"));

/// Text extracted from a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// Page URL
    pub url: String,
    /// Page title, if one was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Readable text, one paragraph per line
    pub text: String,
    /// Whether `text` was cut at the character limit
    pub truncated: bool,
}

/// Extract readable text from HTML
///
/// Always returns a page: malformed markup is parsed best-effort and, if
/// that yields nothing, reduced by plain tag stripping. Output longer than
/// `max_chars` characters is cut to exactly `max_chars` characters.
///
/// # Examples
///
/// ```
/// use search_gateway::tools::extract_article;
///
/// let page = extract_article(
///     "<script>track()</script><p>Hello world.</p>",
///     "https://example.com/article",
///     1000,
/// );
/// assert_eq!(page.text, "Hello world.");
/// assert!(!page.truncated);
/// ```
#[must_use]
pub fn extract_article(html: &str, source_url: &str, max_chars: usize) -> ExtractedPage {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let mut text = extract_structured(&document);
    if text.is_empty() && !html.trim().is_empty() {
        tracing::debug!(url = source_url, "structural extraction empty, stripping tags");
        text = strip_tags(html);
    }

    let (text, truncated) = truncate_chars(text, max_chars);

    ExtractedPage {
        url: source_url.to_string(),
        title,
        text,
        truncated,
    }
}

/// Normalize non-HTML text (plain text, JSON, XML) with the same limits
#[must_use]
pub fn extract_plain(body: &str, source_url: &str, max_chars: usize) -> ExtractedPage {
    let mut builder = TextBuilder::default();
    for line in body.lines() {
        builder.push_text(line);
        builder.break_line();
    }
    let (text, truncated) = truncate_chars(builder.finish(), max_chars);

    ExtractedPage {
        url: source_url.to_string(),
        title: None,
        text,
        truncated,
    }
}

/// Stage 1: main container, else `<body>`, else the whole document
fn extract_structured(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).find(|el| !is_boilerplate(el)) {
            let text = element_text(element);
            if text.chars().count() >= MIN_MAIN_CONTENT_CHARS {
                return text;
            }
        }
    }

    if let Ok(body) = Selector::parse("body")
        && let Some(body) = document.select(&body).next()
    {
        let text = element_text(body);
        if !text.is_empty() {
            return text;
        }
    }

    element_text(document.root_element())
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut builder = TextBuilder::default();
    walk(element, &mut builder, 0);
    builder.finish()
}

fn walk(element: ElementRef<'_>, out: &mut TextBuilder, depth: usize) {
    let name = element.value().name();
    let block = BLOCK_ELEMENTS.contains(&name);

    if block {
        out.break_line();
    }

    if depth >= MAX_WALK_DEPTH {
        for text in element.text() {
            out.push_text(text);
        }
    } else {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                if !is_boilerplate(&child_element) {
                    walk(child_element, out, depth + 1);
                }
            } else if let Some(text) = child.value().as_text() {
                out.push_text(text);
            }
        }
    }

    if block {
        out.break_line();
    }
}

/// Whether an element is a non-content subtree
fn is_boilerplate(element: &ElementRef<'_>) -> bool {
    let el = element.value();

    if SKIP_ELEMENTS.contains(&el.name()) {
        return true;
    }

    if el.attr("hidden").is_some() || el.attr("aria-hidden").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return true;
    }

    if let Some(role) = el.attr("role")
        && BOILERPLATE_ROLES.iter().any(|r| role.eq_ignore_ascii_case(r))
    {
        return true;
    }

    let id_match = el.id().is_some_and(is_boilerplate_token);
    id_match || el.classes().any(is_boilerplate_token)
}

fn is_boilerplate_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    BOILERPLATE_TOKENS.contains(&token.as_str())
        || token.starts_with("ad-")
        || token.starts_with("ads-")
        || token.contains("cookie")
        || token.contains("advert")
}

fn extract_title(document: &Html) -> Option<String> {
    let select_text = |css: &str| -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        let title = collapse_whitespace(&element.text().collect::<String>());
        (!title.is_empty()).then_some(title)
    };

    select_text("title")
        .or_else(|| {
            let selector = Selector::parse("meta[property='og:title']").ok()?;
            let content = document.select(&selector).next()?.value().attr("content")?;
            let title = collapse_whitespace(content);
            (!title.is_empty()).then_some(title)
        })
        .or_else(|| select_text("h1"))
}

/// Stage 2: regex tag strip, guaranteed to return
fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT_LIKE.replace_all(html, " ");
    let with_breaks = BLOCK_TAG.replace_all(&without_scripts, "\n");
    let without_tags = ANY_TAG.replace_all(&with_breaks, " ");
    let decoded = decode_entities(&without_tags);

    let mut builder = TextBuilder::default();
    for line in decoded.lines() {
        builder.push_text(line);
        builder.break_line();
    }
    builder.finish()
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = raw
            .strip_prefix('x')
            .map_or_else(|| raw.parse::<u32>().ok(), |hex| u32::from_str_radix(hex, 16).ok());
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });

    // Last so "&amp;lt;" stays "&lt;"
    numeric.replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `max_chars` characters, on a char boundary
fn truncate_chars(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut text = text;
            text.truncate(byte_idx);
            (text, true)
        }
        None => (text, false),
    }
}

/// Accumulates lines, collapsing whitespace inside each one
#[derive(Default)]
struct TextBuilder {
    lines: Vec<String>,
    current: String,
}

impl TextBuilder {
    fn push_text(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn break_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let line = collapse_whitespace(&self.current);
        if !line.is_empty() {
            self.lines.push(line);
        }
        self.current.clear();
    }

    fn finish(mut self) -> String {
        self.break_line();
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/article";

    #[test]
    fn test_script_removed_paragraph_kept() {
        let page = extract_article("<script>var x = 1;</script><p>Hello world.</p>", URL, 1000);
        assert_eq!(page.text, "Hello world.");
        assert!(!page.truncated);
        assert_eq!(page.url, URL);
    }

    #[test]
    fn test_extract_simple_article() {
        let html = r"
            <!DOCTYPE html>
            <html>
            <head><title>Test Article</title><style>p { color: red }</style></head>
            <body>
                <nav>Navigation here</nav>
                <article>
                    <h1>The Main Title</h1>
                    <p>This is the first paragraph of the article content.
                       It contains some meaningful text that should be extracted.</p>
                    <p>This is another paragraph with more content to ensure
                       the extraction has enough text to treat this as the article.</p>
                </article>
                <footer>Footer content</footer>
            </body>
            </html>
        ";

        let page = extract_article(html, URL, 10_000);
        assert_eq!(page.title.as_deref(), Some("Test Article"));
        let lines: Vec<&str> = page.text.lines().collect();
        assert_eq!(lines[0], "The Main Title");
        assert!(lines[1].starts_with("This is the first paragraph of the article content. It contains"));
        assert_eq!(lines.len(), 3);
        assert!(!page.text.contains("Navigation"));
        assert!(!page.text.contains("Footer"));
        assert!(!page.text.contains("color"));
    }

    #[test]
    fn test_short_article_falls_back_to_body() {
        let html = r#"
            <body>
              <div class="content"><p>Body paragraph one.</p><p>Body paragraph two.</p></div>
              <article><p>Tiny teaser</p></article>
            </body>
        "#;
        let page = extract_article(html, URL, 10_000);
        assert_eq!(
            page.text,
            "Body paragraph one.\nBody paragraph two.\nTiny teaser"
        );
    }

    #[test]
    fn test_boilerplate_containers_removed() {
        let html = r#"
            <body>
              <div id="cookie-banner">We use cookies. Accept?</div>
              <div class="ad-slot">Buy now!</div>
              <div class="sidebar">Popular posts</div>
              <div role="navigation">Home | About</div>
              <div aria-hidden="true">Hidden icon label</div>
              <p>Real   content
                 spans lines.</p>
            </body>
        "#;
        let page = extract_article(html, URL, 10_000);
        assert_eq!(page.text, "Real content spans lines.");
    }

    #[test]
    fn test_inline_elements_do_not_break_lines() {
        let page = extract_article("<p>Hello <b>bold</b> and <a href='#'>linked</a> text.</p>", URL, 1000);
        assert_eq!(page.text, "Hello bold and linked text.");
    }

    #[test]
    fn test_empty_html() {
        let page = extract_article("", URL, 1000);
        assert_eq!(page.text, "");
        assert!(page.title.is_none());
        assert!(!page.truncated);
    }

    #[test]
    fn test_garbage_input_does_not_fail() {
        let page = extract_article("\u{0}\u{1}<<<>>>&&& not really </html> markup <p", URL, 1000);
        assert!(page.text.contains("not really"));
    }

    #[test]
    fn test_only_scripts_yields_empty_text() {
        let page = extract_article("<script>a()</script><style>b{}</style>", URL, 1000);
        assert_eq!(page.text, "");
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let html = format!("<p>{}</p>", "é".repeat(50));
        let page = extract_article(&html, URL, 10);
        assert!(page.truncated);
        assert_eq!(page.text.chars().count(), 10);
        assert_eq!(page.text, "é".repeat(10));
    }

    #[test]
    fn test_exact_length_is_not_truncated() {
        let page = extract_article("<p>abcde</p>", URL, 5);
        assert_eq!(page.text, "abcde");
        assert!(!page.truncated);
    }

    #[test]
    fn test_title_fallbacks() {
        let og = extract_article(
            r#"<html><head><meta property="og:title" content="OG Title"></head><body><p>x</p></body></html>"#,
            URL,
            100,
        );
        assert_eq!(og.title.as_deref(), Some("OG Title"));

        let h1 = extract_article("<body><h1>Heading</h1><p>x</p></body>", URL, 100);
        assert_eq!(h1.title.as_deref(), Some("Heading"));
    }

    #[test]
    fn test_strip_tags_fallback() {
        let text = strip_tags("<div>One &amp; two</div><script>nope()</script><p>Three&nbsp;&#x263A;</p>");
        assert_eq!(text, "One & two\nThree \u{263a}");
    }

    #[test]
    fn test_decode_entities_keeps_escaped_entities() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("&#65;&#bogus;"), "A&#bogus;");
    }

    #[test]
    fn test_extract_plain_text() {
        let page = extract_plain("line one  \n\n   line   two\n", "https://example.com/a.txt", 100);
        assert_eq!(page.text, "line one\nline two");
        assert!(page.title.is_none());
    }
}
