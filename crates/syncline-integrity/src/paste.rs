//! Paste observation and classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::{classify_source, PasteSource};

/// Raw paste data captured from the editing surface.
#[derive(Debug, Clone)]
pub struct PasteInput {
    /// Plain-text form of the pasted content.
    pub text: String,
    /// Rich (HTML) form of the pasted content, when the clipboard
    /// carried one.
    pub rich_content: Option<String>,
}

impl PasteInput {
    /// A plain-text paste.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rich_content: None,
        }
    }

    /// A paste carrying rich formatting.
    pub fn rich(text: impl Into<String>, rich_content: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rich_content: Some(rich_content.into()),
        }
    }
}

/// One observed paste, classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteEvent {
    /// When the paste was observed.
    pub timestamp: DateTime<Utc>,
    /// Plain-text length in characters.
    pub text_length: usize,
    /// Whether foreign rich formatting accompanied the paste.
    pub has_rich_formatting: bool,
    /// Best-effort source fingerprint.
    pub source_guess: PasteSource,
    /// Whether the paste was classified suspicious.
    pub suspicious: bool,
}

/// Classify a paste.
///
/// Suspicious when the plain text exceeds the length threshold, when
/// foreign rich formatting accompanied it, or when the source fingerprint
/// matches a known external editor.
pub(crate) fn classify_paste(input: &PasteInput, length_threshold: usize) -> PasteEvent {
    let rich = input
        .rich_content
        .as_deref()
        .filter(|content| !content.trim().is_empty());
    let has_rich_formatting = rich.is_some();
    let source_guess = rich.map(classify_source).unwrap_or(PasteSource::Unknown);
    let text_length = input.text.chars().count();

    let suspicious =
        text_length > length_threshold || has_rich_formatting || source_guess.is_external_editor();

    PasteEvent {
        timestamp: Utc::now(),
        text_length,
        has_rich_formatting,
        source_guess,
        suspicious,
    }
}
