//! Best-effort source fingerprinting for pasted rich content.
//!
//! External editors leave characteristic markup fragments in the rich
//! clipboard payload. Matching is first-hit over an ordered signature
//! table, most specific first.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Best-effort guess at where a paste originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasteSource {
    /// No recognized signature.
    Unknown,
    /// Microsoft Word (mso-* styles, Office URN schemas).
    MicrosoftWord,
    /// Google Docs (docs-internal-guid markers).
    GoogleDocs,
    /// LibreOffice Writer (generator meta tag).
    LibreOffice,
    /// A generic web page.
    WebPage,
}

impl PasteSource {
    /// Whether this source is a known external editor (a suspicion
    /// signal; plain web-page markup is not).
    pub fn is_external_editor(&self) -> bool {
        matches!(
            self,
            Self::MicrosoftWord | Self::GoogleDocs | Self::LibreOffice
        )
    }

    /// String form used in logs and stats.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::MicrosoftWord => "microsoft_word",
            Self::GoogleDocs => "google_docs",
            Self::LibreOffice => "libreoffice",
            Self::WebPage => "web_page",
        }
    }
}

impl fmt::Display for PasteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered structural signatures, most specific first.
const SIGNATURES: &[(&str, PasteSource)] = &[
    ("urn:schemas-microsoft-com:office", PasteSource::MicrosoftWord),
    ("class=\"MsoNormal\"", PasteSource::MicrosoftWord),
    ("mso-", PasteSource::MicrosoftWord),
    ("docs-internal-guid", PasteSource::GoogleDocs),
    ("content=\"LibreOffice", PasteSource::LibreOffice),
    ("<!DOCTYPE html", PasteSource::WebPage),
    ("<html", PasteSource::WebPage),
];

/// Classify rich clipboard content against the signature table.
pub fn classify_source(rich_content: &str) -> PasteSource {
    for (needle, source) in SIGNATURES {
        if rich_content.contains(needle) {
            return *source;
        }
    }
    PasteSource::Unknown
}
