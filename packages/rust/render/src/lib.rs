//! Article template rendering.
//!
//! Turns [`RenderableArticle`]s into the HTML document handed to the
//! publisher. Rendering is pure: no I/O, no clock, same input same output.

mod cleanup;
mod markdown;

use std::sync::LazyLock;

use pressline_shared::{PresslineError, RenderableArticle, Result};
use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

pub use markdown::{escape_html, markdown_to_html};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    /// Complete HTML fragment, one `<article>` per input.
    pub html: String,
    pub article_count: usize,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Render one or more articles into a single HTML document.
///
/// Fails on an empty slice, an empty title, or a cover reference that is not
/// an absolute http(s) URL.
#[instrument(skip_all, fields(articles = articles.len()))]
pub fn render(articles: &[RenderableArticle]) -> Result<RenderedDocument> {
    if articles.is_empty() {
        return Err(PresslineError::Render("no articles to render".into()));
    }

    let mut sections = Vec::with_capacity(articles.len());
    for article in articles {
        validate(article)?;
        sections.push(render_article(article));
    }

    let html = sections.join("\n<hr class=\"pressline-separator\">\n");
    debug!(html_len = html.len(), "document rendered");

    Ok(RenderedDocument {
        html,
        article_count: articles.len(),
    })
}

/// Strip Markdown down to plain text (for digests and previews).
pub fn plain_text(md: &str) -> String {
    let prepared = cleanup::run_pipeline(md, "");
    let mut words: Vec<String> = Vec::new();
    let mut in_code_block = false;

    for line in prepared.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block || trimmed.is_empty() {
            continue;
        }
        let text = trimmed
            .trim_start_matches('#')
            .trim_start_matches('>')
            .trim_start_matches(['-', '*', '+'])
            .trim();
        words.extend(strip_inline_markup(text).split_whitespace().map(str::to_string));
    }

    words.join(" ")
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

fn validate(article: &RenderableArticle) -> Result<()> {
    if article.title.trim().is_empty() {
        return Err(PresslineError::Render(format!(
            "article {} has no title",
            article.content_id
        )));
    }
    let cover_ok = Url::parse(&article.cover_url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !cover_ok {
        return Err(PresslineError::Render(format!(
            "article {} has an invalid cover reference '{}'",
            article.content_id, article.cover_url
        )));
    }
    Ok(())
}

fn render_article(article: &RenderableArticle) -> String {
    let title = escape_html(article.title.trim());
    let body = markdown_to_html(&cleanup::run_pipeline(&article.body, &article.title));

    let mut out = Vec::new();
    out.push(format!(
        r#"<article class="pressline-article" data-content-id="{}">"#,
        escape_html(&article.content_id)
    ));
    out.push(format!(
        r#"<figure class="cover"><img src="{}" alt="{title}"></figure>"#,
        escape_html(&article.cover_url)
    ));
    out.push(format!("<h1>{title}</h1>"));
    out.push(meta_line(article));

    let digest = article.digest.trim();
    if !digest.is_empty() {
        out.push(format!(
            r#"<blockquote class="digest">{}</blockquote>"#,
            escape_html(digest)
        ));
    }

    if !body.is_empty() {
        out.push(format!(r#"<div class="body">{body}</div>"#));
    }

    if !article.keywords.is_empty() {
        let tags: Vec<String> = article
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| format!(r#"<span class="tag">#{}</span>"#, escape_html(k)))
            .collect();
        if !tags.is_empty() {
            out.push(format!(r#"<p class="keywords">{}</p>"#, tags.join(" ")));
        }
    }

    out.push("</article>".to_string());
    out.join("\n")
}

/// `By <author> · <date> · Source`, omitting missing parts.
fn meta_line(article: &RenderableArticle) -> String {
    let mut parts = Vec::new();
    if let Some(author) = article.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        parts.push(format!("By {}", escape_html(author)));
    }
    if let Some(published) = article.published_at {
        parts.push(published.format("%d %b %Y").to_string());
    }
    parts.push(format!(
        r#"<a href="{}">Source</a>"#,
        escape_html(&article.source_url)
    ));
    format!(r#"<p class="meta">{}</p>"#, parts.join(" · "))
}

fn strip_inline_markup(text: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

    LINK_RE
        .replace_all(text, "$1")
        .replace("**", "")
        .replace("__", "")
        .replace(['*', '`'], "")
}
