//! Article extraction from raw HTML.
//!
//! Picks the title and publish metadata out of the document head, finds the
//! main content container, strips page chrome, and converts what is left to
//! Markdown followed by a short series of `&str -> String` cleanup passes.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use pressline_shared::{PresslineError, Result};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Fields extracted from one article page.
#[derive(Debug, Clone, Default)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    /// Cleaned Markdown body; empty when the page had no readable content.
    pub body: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// `<link rel="canonical">`, when present and absolute.
    pub canonical_url: Option<String>,
}

/// Extract an article from a full HTML document.
pub(crate) fn extract_article(html: &str, base_url: &Url) -> Result<ExtractedArticle> {
    let doc = Html::parse_document(html);

    let content_html = content_html(&doc);
    let body = if content_html.trim().is_empty() {
        String::new()
    } else {
        let converter = htmd::HtmlToMarkdown::builder()
            .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg", "form"])
            .build();
        let raw = converter
            .convert(&strip_chrome(&content_html))
            .map_err(|e| PresslineError::Scrape(format!("htmd conversion failed: {e}")))?;
        run_cleanup(&raw, base_url)
    };

    Ok(ExtractedArticle {
        title: extract_title(&doc),
        body,
        author: meta_content(&doc, r#"meta[name="author"]"#)
            .or_else(|| meta_content(&doc, r#"meta[property="article:author"]"#)),
        published_at: meta_content(&doc, r#"meta[property="article:published_time"]"#)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        canonical_url: canonical_url(&doc),
    })
}

// ---------------------------------------------------------------------------
// Head metadata
// ---------------------------------------------------------------------------

/// `og:title`, then the first `<h1>`, then `<title>`.
fn extract_title(doc: &Html) -> Option<String> {
    if let Some(title) = meta_content(doc, r#"meta[property="og:title"]"#) {
        return Some(title);
    }

    for sel_str in ["h1", "title"] {
        let sel = Selector::parse(sel_str).unwrap();
        let text = doc
            .select(&sel)
            .next()
            .map(|el| collapse_spaces(&el.text().collect::<String>()));
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            return Some(text);
        }
    }
    None
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

fn canonical_url(doc: &Html) -> Option<String> {
    let sel = Selector::parse(r#"link[rel="canonical"]"#).unwrap();
    doc.select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| Url::parse(href).ok())
        .map(|u| u.to_string())
}

// ---------------------------------------------------------------------------
// Content container
// ---------------------------------------------------------------------------

/// Readability heuristics: `<article>`, `<main>`, `[role=main]`, then `<body>`.
fn content_html(doc: &Html) -> String {
    let selectors = ["article", "main", r#"[role="main"]"#, ".post-content", "body"];

    for sel_str in selectors {
        let sel = Selector::parse(sel_str).unwrap();
        if let Some(el) = doc.select(&sel).next() {
            return el.inner_html();
        }
    }
    String::new()
}

/// Strip navigation and other page chrome from a content fragment.
fn strip_chrome(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let chrome_sel = Selector::parse(
        "nav, header, footer, aside, script, style, .share, .related, .newsletter, .advert",
    )
    .unwrap();

    let mut result = html.to_string();
    for el in doc.select(&chrome_sel) {
        result = result.replace(&el.html(), "");
    }
    result
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Markdown cleanup passes
// ---------------------------------------------------------------------------

fn run_cleanup(md: &str, base_url: &Url) -> String {
    let mut result = md.to_string();

    result = strip_leftover_html(&result);
    result = resolve_links(&result, base_url);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

/// Remove container tags that survived conversion, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|figure|figcaption|picture|source)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(md, "").to_string()
}

/// Resolve relative link targets against the page URL. Images are left alone.
fn resolve_links(md: &str, base: &Url) -> String {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex")
    });

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let bang = &caps[1];
            let text = &caps[2];
            let href = &caps[3];

            if !bang.is_empty()
                || href.starts_with("http://")
                || href.starts_with("https://")
                || href.starts_with('#')
                || href.starts_with("mailto:")
            {
                return caps[0].to_string();
            }

            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .to_string()
}

fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of blank lines into one.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<!doctype html>
<html>
<head>
  <title>Site | Fallback Title</title>
  <meta property="og:title" content="Ports Reopen After Storm">
  <meta name="author" content="Jane Doe">
  <meta property="article:published_time" content="2026-02-10T07:30:00+01:00">
  <link rel="canonical" href="https://news.example.com/ports-reopen">
</head>
<body>
  <header><a href="/">Home</a></header>
  <nav><ul><li>World</li></ul></nav>
  <article>
    <h1>Ports Reopen</h1>
    <p>Shipping resumed on <strong>Monday</strong> morning.</p>
    <div class="share">Share this</div>
    <p>See the <a href="/maps/harbor">harbor map</a>.</p>
  </article>
  <footer>Copyright</footer>
  <script>track()</script>
</body>
</html>"#;

    fn base() -> Url {
        Url::parse("https://news.example.com/world/ports").unwrap()
    }

    #[test]
    fn extracts_article_fields() {
        let article = extract_article(ARTICLE, &base()).unwrap();

        assert_eq!(article.title.as_deref(), Some("Ports Reopen After Storm"));
        assert_eq!(article.author.as_deref(), Some("Jane Doe"));
        assert_eq!(
            article.canonical_url.as_deref(),
            Some("https://news.example.com/ports-reopen")
        );
        assert_eq!(
            article.published_at.map(|d| d.to_rfc3339()),
            Some("2026-02-10T06:30:00+00:00".to_string())
        );

        assert!(article.body.contains("Shipping resumed"));
        assert!(article.body.contains("https://news.example.com/maps/harbor"));
        assert!(!article.body.contains("Share this"));
        assert!(!article.body.contains("Copyright"));
        assert!(!article.body.contains("track()"));
    }

    #[test]
    fn title_falls_back_to_h1_then_title_tag() {
        let doc = Html::parse_document("<html><head><title>Tab</title></head><body><h1> Big  News </h1></body></html>");
        assert_eq!(extract_title(&doc).as_deref(), Some("Big News"));

        let doc = Html::parse_document("<html><head><title>Tab Only</title></head><body><p>x</p></body></html>");
        assert_eq!(extract_title(&doc).as_deref(), Some("Tab Only"));
    }

    #[test]
    fn empty_page_yields_empty_body() {
        let article = extract_article("<html><body>   </body></html>", &base()).unwrap();
        assert!(article.body.is_empty());
        assert!(article.title.is_none());
    }

    #[test]
    fn resolve_links_leaves_images_and_anchors() {
        let md = "![chart](/img/c.png) [top](#top) [next](page-2)";
        let result = resolve_links(md, &base());
        assert!(result.contains("![chart](/img/c.png)"));
        assert!(result.contains("[top](#top)"));
        assert!(result.contains("[next](https://news.example.com/world/page-2)"));
    }

    #[test]
    fn cleanup_collapses_blank_lines() {
        let result = run_cleanup("Line 1   \n\n\n\n<div>Line 2</div>\n\n", &base());
        assert_eq!(result, "Line 1\n\nLine 2");
    }
}
