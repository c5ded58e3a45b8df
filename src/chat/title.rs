//! Topic title derivation.
//!
//! A title is requested once per topic with a secondary generation call.
//! Each line of the raw answer is stripped of label prefixes, quotes and
//! markdown decoration; the first line with text left is capped and used.
//! Any failure along the way yields the configured fallback title; it is
//! never surfaced.

use regex::Regex;
use tracing::debug;

use crate::chat::config::{ChatConfig, TITLE_INPUT_PLACEHOLDER};
use crate::chat::generator::{TextGenerator, with_timeout};

/// "Title:" / "Topic:" style labels models like to prepend.
const LABEL_PREFIX: &str = r"(?i)^\s*(?:title|topic|主題|主题)\s*[:：]\s*";

/// Quotes, emphasis, bullets and heading marks around the title.
/// `#` and `-` only count as markup when followed by whitespace.
const DECORATION: &str = r#"^(?:#{1,6}\s+|-\s+|[\s"'`*_~“”‘’「」『』【】])+|[\s"'`*_~“”‘’「」『』【】.。!！]+$"#;

/// Compiled title cleanup patterns.
#[derive(Debug, Clone)]
pub struct TitleCleaner {
    label: Regex,
    decoration: Regex,
}

impl TitleCleaner {
    /// Compile the cleanup patterns.
    ///
    /// # Errors
    /// Returns an error if a pattern is invalid.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            label: Regex::new(LABEL_PREFIX)?,
            decoration: Regex::new(DECORATION)?,
        })
    }

    /// Reduce a raw model answer to a display title of at most `max_chars`
    /// characters. Returns `None` when nothing usable remains.
    #[must_use]
    pub fn clean(&self, raw: &str, max_chars: usize) -> Option<String> {
        let line = raw
            .lines()
            .map(|line| self.strip_line(line))
            .find(|line| !line.is_empty())?;

        let title: String = line.chars().take(max_chars).collect();
        let title = title.trim_end().to_string();
        (!title.is_empty()).then_some(title)
    }

    /// Decoration may wrap the label ("**Title:** x"), so strip it on both sides.
    fn strip_line(&self, line: &str) -> String {
        let line = self.decoration.replace_all(line, "");
        let line = self.label.replace(&line, "");
        self.decoration.replace_all(&line, "").trim().to_string()
    }
}

/// Fill the title prompt template with the first user message.
#[must_use]
pub fn render_title_prompt(template: &str, input: &str) -> String {
    template.replace(TITLE_INPUT_PLACEHOLDER, input.trim())
}

/// Derive a title for a topic opened by `input`.
///
/// Always returns a non-empty title: generation errors, timeouts and empty
/// answers fall back to `config.fallback_title`.
pub async fn derive_title(
    generator: &dyn TextGenerator,
    config: &ChatConfig,
    cleaner: &TitleCleaner,
    input: &str,
) -> String {
    let prompt = render_title_prompt(&config.title_prompt, input);

    match with_timeout(config.generation_timeout(), generator.generate(&prompt, &[])).await {
        Ok(raw) => cleaner.clean(&raw, config.max_title_chars).unwrap_or_else(|| {
            debug!("title answer unusable, using fallback");
            config.fallback_title.clone()
        }),
        Err(err) => {
            debug!("title derivation failed, using fallback: {err}");
            config.fallback_title.clone()
        }
    }
}
