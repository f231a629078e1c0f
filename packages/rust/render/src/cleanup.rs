//! Body preparation passes run before rendering.
//!
//! Each pass is a function `&str -> String` applied in sequence. Bodies come
//! from scrapers or from the summarizer, so they may carry stray HTML,
//! frontmatter, or a heading that repeats the article title.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full preparation pipeline on a Markdown body.
pub(crate) fn run_pipeline(md: &str, title: &str) -> String {
    let mut result = md.to_string();

    result = normalize_line_endings(&result);
    result = strip_frontmatter(&result);
    result = strip_leftover_html(&result);
    result = drop_repeated_title(&result, title);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(md: &str) -> String {
    md.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Frontmatter
// ---------------------------------------------------------------------------

/// Remove a leading `---` YAML block.
fn strip_frontmatter(md: &str) -> String {
    static FRONTMATTER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\A\s*---\n.*?\n---\n").expect("valid regex"));

    FRONTMATTER_RE.replace(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Stray HTML
// ---------------------------------------------------------------------------

/// Remove HTML tags outside code fences, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?[a-zA-Z][a-zA-Z0-9-]*(?:\s[^<>]*)?/?>").expect("valid regex")
    });

    let mut lines = Vec::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            lines.push(line.to_string());
            continue;
        }
        if in_code_block {
            lines.push(line.to_string());
        } else {
            lines.push(HTML_TAG_RE.replace_all(line, "").to_string());
        }
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Repeated title
// ---------------------------------------------------------------------------

/// The template prints the title itself; drop a leading heading that repeats it.
fn drop_repeated_title(md: &str, title: &str) -> String {
    static LEADING_H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\A\s*#{1,2}\s+(.+)\n?").expect("valid regex"));

    if let Some(caps) = LEADING_H_RE.captures(md) {
        if caps[1].trim().eq_ignore_ascii_case(title.trim()) {
            return md[caps[0].len()..].to_string();
        }
    }
    md.to_string()
}

// ---------------------------------------------------------------------------
// Pass 5/6: Whitespace
// ---------------------------------------------------------------------------

fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}
