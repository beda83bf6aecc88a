use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::warn;

mod escape;

pub use escape::escape_html;

pub const URL_PLACEHOLDER: &str = "{{URL}}";
pub const CATEGORY_PLACEHOLDER: &str = "{{CATEGORY}}";

/// Block page template, split once at load time around the first occurrence
/// of each placeholder.
#[derive(Debug, Clone)]
pub struct Template {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Url,
    Category,
}

impl Template {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read block page template {}", path.display()))?;
        let template = Self::parse(&text);
        for placeholder in template.missing_placeholders() {
            warn!(
                path = %path.display(),
                placeholder,
                "block page template is missing a placeholder"
            );
        }
        Ok(template)
    }

    pub fn parse(text: &str) -> Self {
        let mut slots: Vec<(usize, &str, Part)> = [
            (URL_PLACEHOLDER, Part::Url),
            (CATEGORY_PLACEHOLDER, Part::Category),
        ]
        .into_iter()
        .filter_map(|(needle, part)| text.find(needle).map(|idx| (idx, needle, part)))
        .collect();
        slots.sort_by_key(|(idx, _, _)| *idx);

        let mut parts = Vec::with_capacity(slots.len() * 2 + 1);
        let mut cursor = 0;
        for (idx, needle, part) in slots {
            if idx > cursor {
                parts.push(Part::Literal(text[cursor..idx].to_string()));
            }
            parts.push(part);
            cursor = idx + needle.len();
        }
        if cursor < text.len() {
            parts.push(Part::Literal(text[cursor..].to_string()));
        }
        Self { parts }
    }

    pub fn missing_placeholders(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.parts.contains(&Part::Url) {
            missing.push(URL_PLACEHOLDER);
        }
        if !self.parts.contains(&Part::Category) {
            missing.push(CATEGORY_PLACEHOLDER);
        }
        missing
    }

    /// Fill the placeholders with the HTML-escaped url and category.
    ///
    /// Substituted values are never rescanned for placeholders.
    pub fn render(&self, url: &str, category: &str) -> String {
        let url = escape_html(url);
        let category = escape_html(category);
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Url => out.push_str(&url),
                Part::Category => out.push_str(&category),
            }
        }
        out
    }
}

/// Display URL for the block page: the Host header exactly as received plus
/// the request path and query.
pub fn display_url(raw_host: &str, path_and_query: &str) -> String {
    format!("https://{raw_host}{path_and_query}")
}
