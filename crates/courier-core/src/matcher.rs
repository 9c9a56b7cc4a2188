//! Routing predicates over inbound events.

use regex::Regex;

use crate::error::{CoreError, Result};
use crate::event::InboundEvent;

/// A regex anchored at both ends, remembering its source for equality.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles `source` so that it must match the whole text.
    pub fn anchored(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            CoreError::InvalidPattern {
                pattern: source.to_string(),
                source: e,
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as written, without anchors.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Captured groups of a full match, skipping group 0.
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        self.regex.captures(text).map(|caps| {
            caps.iter()
                .skip(1)
                .filter_map(|m| m.map(|m| m.as_str().to_string()))
                .collect()
        })
    }
}

/// Classifies an inbound event into one routing category.
///
/// Categories never overlap for a single event: a command is never free text,
/// and a message with a file is never free text. Overlap between two patterns
/// of the same category (`/[0-9]+` vs `/.*`) is resolved by the registry's
/// registration order, not here.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// An explicit bot command whose text matches the pattern.
    Command(Pattern),
    /// A plain message, without file, whose text matches the pattern.
    FreeText(Pattern),
    /// Any message carrying a file.
    AttachedFile,
}

impl Matcher {
    pub fn command(pattern: &str) -> Result<Self> {
        Ok(Self::Command(Pattern::anchored(pattern)?))
    }

    pub fn free_text(pattern: &str) -> Result<Self> {
        Ok(Self::FreeText(Pattern::anchored(pattern)?))
    }

    pub fn attached_file() -> Self {
        Self::AttachedFile
    }

    /// Returns true if this matcher accepts the event.
    pub fn matches(&self, event: &InboundEvent) -> bool {
        match self {
            Self::Command(pattern) => {
                event.is_command && event.text.as_deref().is_some_and(|t| pattern.matches(t))
            }
            Self::FreeText(pattern) => {
                !event.is_command
                    && event.file.is_none()
                    && event.text.as_deref().is_some_and(|t| pattern.matches(t))
            }
            Self::AttachedFile => event.file.is_some(),
        }
    }

    /// Captured groups for an accepted event. Empty for [`Matcher::AttachedFile`].
    pub fn captures(&self, event: &InboundEvent) -> Option<Vec<String>> {
        if !self.matches(event) {
            return None;
        }
        match self {
            Self::Command(pattern) | Self::FreeText(pattern) => {
                pattern.captures(event.text_or_empty())
            }
            Self::AttachedFile => Some(Vec::new()),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Command(a), Self::Command(b)) => a.source == b.source,
            (Self::FreeText(a), Self::FreeText(b)) => a.source == b.source,
            (Self::AttachedFile, Self::AttachedFile) => true,
            _ => false,
        }
    }
}

impl Eq for Matcher {}

impl std::fmt::Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(p) => write!(f, "command({})", p.source),
            Self::FreeText(p) => write!(f, "text({})", p.source),
            Self::AttachedFile => write!(f, "file"),
        }
    }
}
