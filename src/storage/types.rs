use crate::error::{FailureKind, NotetionError};
use crate::parser::DocumentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a processing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, not yet completed
    Running,
    /// Completed with a note
    Succeeded,
    /// Completed with a failure reason
    Failed,
}

impl SessionStatus {
    /// Lowercase name stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Whether the status is final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = NotetionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "succeeded" | "success" => Ok(Self::Succeeded),
            "failed" | "failure" => Ok(Self::Failed),
            other => Err(NotetionError::InvalidParameter(format!(
                "Unknown session status: {}",
                other
            ))),
        }
    }
}

/// Per-file processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Text was extracted and contributed to the prompt
    Parsed,
    /// Parsing failed; see the failure kind
    Failed,
}

impl FileStatus {
    /// Lowercase name stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for FileStatus {
    type Err = NotetionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "parsed" => Ok(Self::Parsed),
            "failed" => Ok(Self::Failed),
            other => Err(NotetionError::Storage(format!("Unknown file status: {}", other))),
        }
    }
}

/// Parameters of a session at creation time
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    /// Generated session id (UUID v4)
    pub id: String,
    /// Model identifier selected for the session
    pub model: String,
    /// Creativity parameter in [0, 1]
    pub creativity: f64,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
}

impl NewSession {
    /// Starts a new session now with a fresh id
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::storage::NewSession;
    ///
    /// let session = NewSession::new("gpt-4", 0.3);
    /// assert_eq!(session.id.len(), 36);
    /// ```
    pub fn new(model: impl Into<String>, creativity: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model: model.into(),
            creativity,
            started_at: Utc::now(),
        }
    }
}

/// One input document of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name as supplied by the caller
    pub name: String,
    /// Declared document type
    pub kind: DocumentKind,
    /// Raw size in bytes
    pub size_bytes: u64,
    /// SHA-256 of the raw bytes
    pub content_hash: String,
    /// Bounded prefix of the normalized text (empty when parsing failed)
    pub preview: String,
    /// Whether the file contributed to the prompt
    pub status: FileStatus,
    /// Failure reason for `failed` files
    pub failure: Option<FailureKind>,
    /// Human-readable failure detail
    pub failure_detail: Option<String>,
}

/// The generated note of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    /// Full note content
    pub content: String,
    /// SHA-256 of the note content
    pub content_hash: String,
    /// When the note was created
    pub created_at: DateTime<Utc>,
}

impl NoteRecord {
    /// Builds a note record, hashing the content
    pub fn new(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let content = content.into();
        Self {
            content_hash: crate::parser::content_hash(content.as_bytes()),
            content,
            created_at,
        }
    }
}

/// Token and cost totals of a session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionTotals {
    /// Input tokens over the combined prompt text
    pub input_tokens: u64,
    /// Output tokens over the generated note
    pub output_tokens: u64,
    /// True if either count came from the character-ratio fallback
    pub tokens_approximate: bool,
    /// Estimated cost in currency units
    pub estimated_cost: f64,
}

/// Terminal state written by `complete_session`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    /// End timestamp
    pub ended_at: DateTime<Utc>,
    /// `succeeded` or `failed`
    pub status: SessionStatus,
    /// Token and cost totals
    pub totals: SessionTotals,
    /// Failure reason for failed sessions
    pub failure: Option<FailureKind>,
    /// Human-readable failure detail
    pub failure_detail: Option<String>,
    /// Generated note, present only for succeeded sessions
    pub note: Option<NoteRecord>,
}

/// Session row as returned by listing and search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub id: String,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
    /// End timestamp, once completed
    pub ended_at: Option<DateTime<Utc>>,
    /// Model identifier
    pub model: String,
    /// Creativity parameter
    pub creativity: f64,
    /// Status
    pub status: SessionStatus,
    /// Token and cost totals
    #[serde(flatten)]
    pub totals: SessionTotals,
    /// Failure reason
    pub failure: Option<FailureKind>,
    /// Failure detail
    pub failure_detail: Option<String>,
    /// Seconds between start and end
    pub processing_time_secs: Option<f64>,
    /// Characters in the note
    pub note_length: Option<u64>,
    /// Number of files recorded for the session
    pub file_count: u64,
}

/// Full session view: session, files, and note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session row
    pub session: SessionSummary,
    /// Files in input order
    pub files: Vec<FileRecord>,
    /// Generated note
    pub note: Option<NoteRecord>,
}

/// Filters for `SqliteStorage::search`; every filter is optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// Case-insensitive substring of the note content or a file name
    pub text: Option<String>,
    /// Exact model identifier
    pub model: Option<String>,
    /// Session status
    pub status: Option<SessionStatus>,
    /// Inclusive lower bound on the start timestamp
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the start timestamp
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

/// A previous occurrence of a file hash
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOccurrence {
    /// Session that recorded the file
    pub session_id: String,
    /// File name in that session
    pub name: String,
    /// Session start timestamp
    pub started_at: DateTime<Utc>,
}

/// Counts of records created by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Sessions created
    pub sessions: usize,
    /// Files created
    pub files: usize,
    /// Notes created
    pub notes: usize,
}

/// Snapshot serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One row per session
    Csv,
    /// Nested session, files, and note
    Json,
}

impl ExportFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = NotetionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(NotetionError::InvalidParameter(format!(
                "Unsupported export format: {} (expected csv or json)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_parse() {
        assert_eq!("Succeeded".parse::<SessionStatus>().unwrap(), SessionStatus::Succeeded);
        assert_eq!("failed".parse::<SessionStatus>().unwrap(), SessionStatus::Failed);
        assert!("done".parse::<SessionStatus>().is_err());
        assert!(!SessionStatus::Running.is_terminal());
    }

    #[test]
    fn test_note_record_hash_is_deterministic() {
        let now = Utc::now();
        let a = NoteRecord::new("# Title", now);
        let b = NoteRecord::new("# Title", now);
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, NoteRecord::new("# Other", now).content_hash);
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
