//! Prompt construction and the reference gate
//!
//! The user message carries the resolved source document as labeled
//! sections followed by the optional task directives. Persona, purpose and
//! content type shape the system message, which also pins the output format
//! that `result_parser` reads back.

use regex::Regex;
use thiserror::Error;

use super::content_fetcher::SourceContent;
use super::generation_client::ChatMessage;
use super::result_parser::{serialize_variants, ParsedVariant};
use crate::models::TaskConfig;

/// Why an item reference was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("missing reference: item has no source link")]
    Missing,

    #[error("invalid reference: {0} does not link to an allowed domain")]
    Invalid(String),
}

/// Accepts only http(s) links on the configured domains (subdomains included)
#[derive(Debug, Clone)]
pub struct ReferenceGate {
    pattern: Regex,
}

impl ReferenceGate {
    /// Build the gate; an empty domain list accepts any http(s) link
    pub fn new(allowed_domains: &[String]) -> Result<Self, regex::Error> {
        let domains: Vec<String> = allowed_domains
            .iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .map(|d| regex::escape(&d))
            .collect();

        let host = if domains.is_empty() {
            r"[^\s/?#:]+".to_string()
        } else {
            format!(r"(?:[a-z0-9-]+\.)*(?:{})", domains.join("|"))
        };

        let pattern = Regex::new(&format!(r"(?i)^https?://{}(?::\d+)?(?:[/?#]\S*)?$", host))?;
        Ok(Self { pattern })
    }

    /// Check an item reference, returning the trimmed link on success
    pub fn check<'a>(&self, reference: Option<&'a str>) -> Result<&'a str, ReferenceError> {
        let reference = match reference.map(str::trim) {
            Some(r) if !r.is_empty() => r,
            _ => return Err(ReferenceError::Missing),
        };

        if self.pattern.is_match(reference) {
            Ok(reference)
        } else {
            Err(ReferenceError::Invalid(reference.to_string()))
        }
    }
}

/// Compose the system and user messages for one item
pub fn build_messages(content: &SourceContent, config: &TaskConfig, variants: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(config, variants)),
        ChatMessage::user(user_prompt(content, config)),
    ]
}

fn system_prompt(config: &TaskConfig, variants: usize) -> String {
    let mut prompt = String::from(
        "You rewrite social media posts into fresh, original content that keeps the \
         useful information of the source but shares none of its sentences.",
    );

    if let Some(persona) = non_blank(&config.persona) {
        prompt.push_str(&format!("\nWrite in the voice of: {}.", persona));
    }
    if let Some(purpose) = non_blank(&config.purpose) {
        prompt.push_str(&format!("\nThe rewrite is meant to: {}.", purpose));
    }
    if !config.content_type.trim().is_empty() {
        prompt.push_str(&format!("\nContent type: {}.", config.content_type.trim()));
    }

    let example: Vec<ParsedVariant> = (1..=variants.max(1))
        .map(|i| ParsedVariant::new(format!("<title {}>", i), format!("<body {}>", i)))
        .collect();

    prompt.push_str(&format!(
        "\n\nProduce exactly {} distinct versions. Use plain text without markdown and \
         follow this format exactly:\n\n{}",
        variants.max(1),
        serialize_variants(&example)
    ));
    prompt
}

fn user_prompt(content: &SourceContent, config: &TaskConfig) -> String {
    let mut sections = Vec::new();

    if !content.title.trim().is_empty() {
        sections.push(format!("[Original title]\n{}", content.title.trim()));
    }
    if !content.body.trim().is_empty() {
        sections.push(format!("[Original body]\n{}", content.body.trim()));
    }
    if !content.tags.is_empty() {
        sections.push(format!("[Original tags]\n{}", content.tags.join(", ")));
    }

    if let Some(theme) = non_blank(&config.theme) {
        sections.push(format!("[Theme]\n{}", theme));
    }
    if let Some(positioning) = non_blank(&config.account_positioning) {
        sections.push(format!("[Account positioning]\n{}", positioning));
    }
    let keywords: Vec<&str> = config
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if !keywords.is_empty() {
        sections.push(format!("[SEO keywords]\n{}", keywords.join(", ")));
    }

    sections.join("\n\n")
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
