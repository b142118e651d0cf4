//! Document parser for Notetion
//!
//! Normalizes TXT, PDF, and JSON input into plain text plus a content hash
//! over the raw bytes. Parsing is a pure transformation; the only limit is
//! the configured byte ceiling, checked before any decoding work.

mod json;
mod pdf;

use crate::error::{NotetionError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use json::flatten_json;
pub use pdf::join_pages;

/// Declared type of an input document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Plain UTF-8 text
    Txt,
    /// PDF document with a text layer
    Pdf,
    /// JSON document
    Json,
}

impl DocumentKind {
    /// Lowercase name used in the database and exports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Pdf => "pdf",
            Self::Json => "json",
        }
    }

    /// Derive the kind from a file extension (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::parser::DocumentKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(DocumentKind::from_path(Path::new("slides.PDF")), Some(DocumentKind::Pdf));
    /// assert_eq!(DocumentKind::from_path(Path::new("image.png")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    /// Derive the kind from a MIME type such as `application/pdf`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "text/plain" => Some(Self::Txt),
            "application/pdf" => Some(Self::Pdf),
            "application/json" | "text/json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = NotetionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "pdf" => Ok(Self::Pdf),
            "json" => Ok(Self::Json),
            other => Err(NotetionError::UnsupportedContent(format!(
                "Unsupported file type: {}",
                other
            ))),
        }
    }
}

/// Normalized text extracted from one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Plain-text rendering of the document
    pub text: String,
    /// SHA-256 hex digest of the raw bytes
    pub content_hash: String,
}

/// Hex-encoded SHA-256 digest
///
/// Used for file content hashes and note hashes; identical input always
/// yields the identical digest.
///
/// # Examples
///
/// ```
/// use notetion::parser::content_hash;
///
/// assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
/// assert_eq!(content_hash(b"").len(), 64);
/// ```
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{:x}", digest)
}

/// Returns at most `max_chars` characters of `text`, on a char boundary
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Format-aware document parser with a byte ceiling
#[derive(Debug, Clone, Copy)]
pub struct DocumentParser {
    max_bytes: u64,
}

impl DocumentParser {
    /// Create a parser that rejects inputs larger than `max_bytes`
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Configured byte ceiling
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Parse raw bytes according to their declared type
    ///
    /// # Errors
    ///
    /// - `InputTooLarge` when `raw` exceeds the ceiling (checked first)
    /// - `MalformedInput` for invalid UTF-8 text or invalid JSON syntax
    /// - `UnsupportedContent` for documents with no extractable text
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::parser::{DocumentKind, DocumentParser};
    ///
    /// let parser = DocumentParser::new(1024);
    /// let doc = parser.parse(br#"{"topic": "entropy"}"#, DocumentKind::Json).unwrap();
    /// assert_eq!(doc.text, "topic: entropy");
    /// ```
    pub fn parse(&self, raw: &[u8], kind: DocumentKind) -> Result<ParsedDocument> {
        let size = raw.len() as u64;
        if size > self.max_bytes {
            return Err(NotetionError::InputTooLarge {
                size,
                limit: self.max_bytes,
            }
            .into());
        }

        let text = match kind {
            DocumentKind::Txt => parse_text(raw)?,
            DocumentKind::Pdf => pdf::extract(raw)?,
            DocumentKind::Json => json::render(raw)?,
        };

        if text.trim().is_empty() {
            return Err(NotetionError::UnsupportedContent(format!(
                "{} document has no extractable text",
                kind
            ))
            .into());
        }

        tracing::debug!(
            "Parsed {} document: {} bytes -> {} chars",
            kind,
            size,
            text.chars().count()
        );

        Ok(ParsedDocument {
            text,
            content_hash: content_hash(raw),
        })
    }
}

fn parse_text(raw: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| NotetionError::MalformedInput(format!("Text is not valid UTF-8: {}", e)))?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}
