//! Minimal Markdown-to-HTML conversion for article bodies.
//!
//! Covers what scrapers and the summarizer actually produce: headings,
//! paragraphs, lists, block quotes, fenced code, rules, and the inline
//! emphasis/link/image/code forms. All text is escaped before inline markup is
//! applied, and only http(s)/mailto targets become links or images.

use std::sync::LazyLock;

use regex::Regex;

/// Escape text for inclusion in HTML content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Block level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

#[derive(Default)]
struct BlockWriter {
    html: Vec<String>,
    paragraph: Vec<String>,
    quote: Vec<String>,
    list: Option<(ListKind, Vec<String>)>,
}

impl BlockWriter {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let text = self.paragraph.join(" ");
            self.html.push(format!("<p>{}</p>", render_inline(&text)));
            self.paragraph.clear();
        }
    }

    fn flush_quote(&mut self) {
        if !self.quote.is_empty() {
            let text = self.quote.join(" ");
            self.html
                .push(format!("<blockquote><p>{}</p></blockquote>", render_inline(&text)));
            self.quote.clear();
        }
    }

    fn flush_list(&mut self) {
        if let Some((kind, items)) = self.list.take() {
            let tag = match kind {
                ListKind::Unordered => "ul",
                ListKind::Ordered => "ol",
            };
            let items: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", render_inline(item)))
                .collect();
            self.html.push(format!("<{tag}>{items}</{tag}>"));
        }
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_quote();
        self.flush_list();
    }

    fn push_list_item(&mut self, kind: ListKind, text: &str) {
        self.flush_paragraph();
        self.flush_quote();
        match &mut self.list {
            Some((current, items)) if *current == kind => items.push(text.to_string()),
            _ => {
                self.flush_list();
                self.list = Some((kind, vec![text.to_string()]));
            }
        }
    }
}

/// Convert a Markdown body to an HTML fragment.
///
/// Headings are shifted down one level (`#` becomes `<h2>`) because the
/// article template owns the `<h1>`.
pub fn markdown_to_html(md: &str) -> String {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*$").expect("valid regex"));
    static UL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[-*+]\s+(.+)$").expect("valid regex"));
    static OL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d{1,3}[.)]\s+(.+)$").expect("valid regex"));
    static RULE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:-{3,}|\*{3,}|_{3,})$").expect("valid regex"));

    let mut writer = BlockWriter::default();
    let mut code: Option<Vec<String>> = None;

    for line in md.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            match code.take() {
                Some(lines) => {
                    writer
                        .html
                        .push(format!("<pre><code>{}</code></pre>", escape_html(&lines.join("\n"))));
                }
                None => {
                    writer.flush_all();
                    code = Some(Vec::new());
                }
            }
            continue;
        }
        if let Some(lines) = code.as_mut() {
            lines.push(line.to_string());
            continue;
        }

        if trimmed.is_empty() {
            writer.flush_all();
            continue;
        }

        if RULE_RE.is_match(trimmed) {
            writer.flush_all();
            writer.html.push("<hr>".to_string());
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(trimmed) {
            writer.flush_all();
            let level = (caps[1].len() + 1).min(4);
            writer
                .html
                .push(format!("<h{level}>{}</h{level}>", render_inline(&caps[2])));
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix('>') {
            writer.flush_paragraph();
            writer.flush_list();
            writer.quote.push(rest.trim().to_string());
            continue;
        }

        if let Some(caps) = UL_RE.captures(trimmed) {
            writer.push_list_item(ListKind::Unordered, &caps[1]);
            continue;
        }
        if let Some(caps) = OL_RE.captures(trimmed) {
            writer.push_list_item(ListKind::Ordered, &caps[1]);
            continue;
        }

        writer.flush_quote();
        writer.flush_list();
        writer.paragraph.push(trimmed.to_string());
    }

    // Unterminated fence: keep its content as code.
    if let Some(lines) = code {
        writer
            .html
            .push(format!("<pre><code>{}</code></pre>", escape_html(&lines.join("\n"))));
    }
    writer.flush_all();

    writer.html.join("\n")
}

// ---------------------------------------------------------------------------
// Inline level
// ---------------------------------------------------------------------------

/// Render inline Markdown. Backtick spans are kept verbatim (escaped).
pub(crate) fn render_inline(text: &str) -> String {
    let parts: Vec<&str> = text.split('`').collect();
    // An even number of parts means an unmatched backtick; treat it as text.
    if parts.len() % 2 == 0 {
        return render_spans(text);
    }

    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 1 {
                format!("<code>{}</code>", escape_html(part))
            } else {
                render_spans(part)
            }
        })
        .collect()
}

fn render_spans(text: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid regex"));
    static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\*\*([^*]+)\*\*|__([^_]+)__").expect("valid regex")
    });
    static ITALIC_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*([^*\s][^*]*)\*").expect("valid regex"));

    let escaped = escape_html(text);

    let result = IMAGE_RE.replace_all(&escaped, |caps: &regex::Captures| {
        if is_safe_target(&caps[2]) {
            format!(r#"<img src="{}" alt="{}">"#, &caps[2], &caps[1])
        } else {
            caps[1].to_string()
        }
    });

    let result = LINK_RE.replace_all(&result, |caps: &regex::Captures| {
        if is_safe_target(&caps[2]) {
            format!(r#"<a href="{}">{}</a>"#, &caps[2], &caps[1])
        } else {
            caps[1].to_string()
        }
    });

    let result = BOLD_RE.replace_all(&result, |caps: &regex::Captures| {
        let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        format!("<strong>{inner}</strong>")
    });

    ITALIC_RE.replace_all(&result, "<em>$1</em>").to_string()
}

fn is_safe_target(target: &str) -> bool {
    target.starts_with("https://") || target.starts_with("http://") || target.starts_with("mailto:")
}
