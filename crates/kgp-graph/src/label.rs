//! Identifier-safe graph labels
//!
//! Node labels, edge labels and key property names end up as identifiers in
//! query text, where they cannot be bound as parameters. They come from
//! model output, so every one of them goes through [`GraphLabel::new`].

use kgp_core::{KgpError, Result};

/// Longest label accepted
pub const MAX_LABEL_LEN: usize = 128;

/// A validated node label, edge label or property name
///
/// Only ASCII letters, digits and underscores are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphLabel(String);

impl GraphLabel {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let reason = if raw.is_empty() {
            Some("label is empty".to_string())
        } else if raw.len() > MAX_LABEL_LEN {
            Some(format!("label is longer than {MAX_LABEL_LEN} characters"))
        } else if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            Some(format!("character {c:?} is not allowed"))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(KgpError::InvalidLabel { label: raw, reason }),
            None => Ok(Self(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Backtick-quoted form for splicing into query text
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0)
    }
}

impl std::fmt::Display for GraphLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GraphLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
