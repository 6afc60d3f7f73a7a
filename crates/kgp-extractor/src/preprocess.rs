//! Text preprocessing before extraction
//!
//! Coreference resolution runs in an external NLP service; this module only
//! defines the seam and the cleaning half.

use once_cell::sync::Lazy;
use regex::Regex;

use kgp_core::Result;

static ALL_CAPS_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]+\b").expect("caps pattern"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").expect("space pattern"));

/// Turns raw document text into extraction-ready text
pub trait Preprocessor: Send + Sync {
    fn resolve_and_clean(&self, text: &str) -> Result<String>;
}

/// Cleans text without resolving coreferences
///
/// Newlines become spaces, all-uppercase words (acronyms, shouted headers)
/// are removed, and runs of spaces collapse.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCleaner;

impl TextCleaner {
    pub fn clean(&self, text: &str) -> String {
        let text = text.replace('\n', " ");
        let text = ALL_CAPS_WORD.replace_all(&text, "");
        SPACES.replace_all(text.trim(), " ").into_owned()
    }
}

impl Preprocessor for TextCleaner {
    fn resolve_and_clean(&self, text: &str) -> Result<String> {
        Ok(self.clean(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let cleaner = TextCleaner;
        assert_eq!(
            cleaner.clean("BREAKING NEWS\nThe UN met in Geneva  today."),
            "The met in Geneva today."
        );
    }

    #[test]
    fn test_clean_keeps_mixed_case() {
        assert_eq!(TextCleaner.clean("  McDonald's   opened "), "McDonald's opened");
    }
}
