//! Result parser
//!
//! Splits generated text into ordered (title, body) pairs and strips
//! markdown so stored variants are plain text.
//!
//! Accepted version markers, one per line:
//! `Version 1`, `## Version 2:`, `**Version 1**`, `【版本1】`, `版本二`.
//! A Latin marker number may be followed by `:`, `：` or a period that ends
//! the number, so `Version 2.0 ships` stays body text.
//! Within a section a `Title:` / `标题：` line names the title and a
//! `Body:` / `正文：` line starts the body. Without labels the first
//! non-empty line is the title and the remainder is the body.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One generated version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedVariant {
    pub title: String,
    pub body: String,
}

impl ParsedVariant {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

static LATIN_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*)?\s*(?:version|variant)\s*(\d+)\s*(?:\*\*)?\s*(?:(?:[:：]|\.(?:\s|$))\s*(?:\*\*)?\s*(.*))?$",
    )
    .expect("version marker regex")
});

static CJK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:#{1,6}\s*)?(?:\*\*)?\s*[【\[]?\s*版本\s*([0-9一二三四五六七八九十]+)\s*[】\]]?\s*(?:\*\*)?\s*(?:[:：]\s*(?:\*\*)?\s*(.*))?$",
    )
    .expect("cjk version marker regex")
});

static TITLE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?\s*(?:title|标题)\s*(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*(.*)$")
        .expect("title label regex")
});

static BODY_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?\s*(?:body|content|正文|内容)\s*(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*(.*)$")
        .expect("body label regex")
});

/// Parse generated text into ordered versions
///
/// Text before the first marker is ignored when markers exist. Without any
/// marker the whole text is one version. Sections with neither title nor body
/// are dropped, so the result may hold fewer (or more) entries than requested.
pub fn parse_variants(full_text: &str) -> Vec<ParsedVariant> {
    let mut sections: Vec<Vec<&str>> = Vec::new();
    let mut preamble: Vec<&str> = Vec::new();

    for line in full_text.lines() {
        if let Some(rest) = marker_remainder(line) {
            let mut section = Vec::new();
            if !rest.trim().is_empty() {
                section.push(rest);
            }
            sections.push(section);
        } else if let Some(current) = sections.last_mut() {
            current.push(line);
        } else {
            preamble.push(line);
        }
    }

    if sections.is_empty() {
        sections.push(preamble);
    }

    sections
        .iter()
        .filter_map(|lines| parse_section(lines))
        .collect()
}

/// Write versions in the marker format [`parse_variants`] reads back
pub fn serialize_variants(variants: &[ParsedVariant]) -> String {
    variants
        .iter()
        .enumerate()
        .map(|(i, v)| format!("Version {}\nTitle: {}\nBody: {}", i + 1, v.title, v.body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Returns the text following a version marker, or None if `line` is not one
fn marker_remainder(line: &str) -> Option<&str> {
    let caps = LATIN_MARKER
        .captures(line)
        .or_else(|| CJK_MARKER.captures(line))?;
    Some(caps.get(2).map(|m| m.as_str()).unwrap_or(""))
}

fn parse_section(lines: &[&str]) -> Option<ParsedVariant> {
    let mut title: Option<String> = None;
    let mut body_lines: Vec<&str> = Vec::new();
    let mut labelled = false;

    for line in lines {
        if title.is_none() {
            if let Some(caps) = TITLE_LABEL.captures(line) {
                title = Some(caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string());
                labelled = true;
                continue;
            }
        }
        if let Some(caps) = BODY_LABEL.captures(line) {
            labelled = true;
            if let Some(rest) = caps.get(1) {
                body_lines.push(rest.as_str());
            }
            continue;
        }
        body_lines.push(line);
    }

    if !labelled {
        let first = body_lines.iter().position(|l| !clean_markup(l).is_empty())?;
        title = Some(body_lines[first].to_string());
        body_lines.drain(..=first);
    }

    let title = clean_markup(title.as_deref().unwrap_or(""));
    let body = clean_markup(&body_lines.join("\n"));

    if title.is_empty() && body.is_empty() {
        return None;
    }
    Some(ParsedVariant { title, body })
}

static FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:```|~~~)").expect("fence regex"));
static RULE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").expect("rule regex")
});
static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(?:\|\s*:?-{3,}:?\s*)*\|?\s*$").expect("table separator regex")
});
static LINE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:#{1,6}|>|[-*+]|\d+[.)])\s+|>)+").expect("line prefix regex")
});
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("image regex"));
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("link regex"));
static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*|__([^_\n]+?)__").expect("bold regex"));
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~([^~\n]+?)~~").expect("strike regex"));
static ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s][^*\n]*?)\*").expect("italic regex"));
static ITALIC_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\w])_([^_\s][^_\n]*?)_([^\w]|$)").expect("italic regex"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("code regex"));

/// Strip markdown to plain text
///
/// Trims every line and collapses runs of blank lines. Applying it twice gives
/// the same result as applying it once.
pub fn clean_markup(text: &str) -> String {
    let mut current = clean_pass(text);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        if FENCE_LINE.is_match(line) || RULE_LINE.is_match(line) || TABLE_SEPARATOR.is_match(line) {
            continue;
        }

        let mut line = LINE_PREFIX.replace(line, "").into_owned();
        line = table_row(&line);
        line = IMAGE.replace_all(&line, "$1").into_owned();
        line = LINK.replace_all(&line, "$1").into_owned();
        line = BOLD.replace_all(&line, "$1$2").into_owned();
        line = STRIKE.replace_all(&line, "$1").into_owned();
        line = ITALIC_STAR.replace_all(&line, "$1").into_owned();
        line = ITALIC_UNDERSCORE.replace_all(&line, "$1$2$3").into_owned();
        line = INLINE_CODE.replace_all(&line, "$1").into_owned();

        let line = line.trim();
        if line.is_empty() && out.last().map(|l| l.is_empty()).unwrap_or(true) {
            continue;
        }
        out.push(line.to_string());
    }

    while out.last().map(|l| l.is_empty()).unwrap_or(false) {
        out.pop();
    }
    out.join("\n")
}

/// `| a | b |` → `a b`
fn table_row(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('|') || !trimmed.ends_with('|') {
        return line.to_string();
    }
    trimmed[1..trimmed.len() - 1]
        .split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
