//! Snapshot serialization for export and import
//!
//! JSON keeps the nested session, files, note structure. CSV has one row per
//! session; files travel as a JSON array in the `files_json` column and the
//! note in its own columns, so both formats re-import to the same records.

use super::types::{
    ExportFormat, FileRecord, NoteRecord, SessionStatus, SessionSummary, SessionTotals,
    SessionView,
};
use crate::error::{FailureKind, NotetionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct JsonSnapshot {
    version: u32,
    exported_at: DateTime<Utc>,
    sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    session_id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    model: String,
    creativity: f64,
    status: SessionStatus,
    input_tokens: u64,
    output_tokens: u64,
    tokens_approximate: bool,
    estimated_cost: f64,
    failure_kind: Option<FailureKind>,
    failure_detail: Option<String>,
    processing_time_secs: Option<f64>,
    note_length: Option<u64>,
    file_count: u64,
    note_count: u64,
    note_content: Option<String>,
    note_hash: Option<String>,
    note_created_at: Option<DateTime<Utc>>,
    files_json: String,
}

impl CsvRow {
    fn from_view(view: &SessionView) -> Result<Self> {
        let session = &view.session;
        Ok(Self {
            session_id: session.id.clone(),
            started_at: session.started_at,
            ended_at: session.ended_at,
            model: session.model.clone(),
            creativity: session.creativity,
            status: session.status,
            input_tokens: session.totals.input_tokens,
            output_tokens: session.totals.output_tokens,
            tokens_approximate: session.totals.tokens_approximate,
            estimated_cost: session.totals.estimated_cost,
            failure_kind: session.failure,
            failure_detail: session.failure_detail.clone(),
            processing_time_secs: session.processing_time_secs,
            note_length: session.note_length,
            file_count: view.files.len() as u64,
            note_count: u64::from(view.note.is_some()),
            note_content: view.note.as_ref().map(|n| n.content.clone()),
            note_hash: view.note.as_ref().map(|n| n.content_hash.clone()),
            note_created_at: view.note.as_ref().map(|n| n.created_at),
            files_json: serde_json::to_string(&view.files)?,
        })
    }

    fn into_view(self) -> Result<SessionView> {
        let files: Vec<FileRecord> = serde_json::from_str(&self.files_json).map_err(|e| {
            NotetionError::MalformedInput(format!(
                "Invalid files_json for session {}: {}",
                self.session_id, e
            ))
        })?;
        let note = match (self.note_content, self.note_hash, self.note_created_at) {
            (Some(content), Some(content_hash), Some(created_at)) => Some(NoteRecord {
                content,
                content_hash,
                created_at,
            }),
            (None, None, None) => None,
            _ => {
                return Err(NotetionError::MalformedInput(format!(
                    "Incomplete note columns for session {}",
                    self.session_id
                ))
                .into())
            }
        };
        if self.note_count != u64::from(note.is_some()) || self.file_count != files.len() as u64 {
            return Err(NotetionError::MalformedInput(format!(
                "Counts do not match contents for session {}",
                self.session_id
            ))
            .into());
        }

        Ok(SessionView {
            session: SessionSummary {
                id: self.session_id,
                started_at: self.started_at,
                ended_at: self.ended_at,
                model: self.model,
                creativity: self.creativity,
                status: self.status,
                totals: SessionTotals {
                    input_tokens: self.input_tokens,
                    output_tokens: self.output_tokens,
                    tokens_approximate: self.tokens_approximate,
                    estimated_cost: self.estimated_cost,
                },
                failure: self.failure_kind,
                failure_detail: self.failure_detail,
                processing_time_secs: self.processing_time_secs,
                note_length: self.note_length,
                file_count: files.len() as u64,
            },
            files,
            note,
        })
    }
}

/// Serializes session views in the given format
pub fn render(format: ExportFormat, views: &[SessionView]) -> Result<String> {
    match format {
        ExportFormat::Json => {
            let snapshot = JsonSnapshot {
                version: SNAPSHOT_VERSION,
                exported_at: Utc::now(),
                sessions: views.to_vec(),
            };
            Ok(serde_json::to_string_pretty(&snapshot)?)
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for view in views {
                writer
                    .serialize(CsvRow::from_view(view)?)
                    .map_err(|e| NotetionError::Storage(format!("CSV export failed: {}", e)))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| NotetionError::Storage(format!("CSV export failed: {}", e)))?;
            String::from_utf8(bytes)
                .map_err(|e| NotetionError::Storage(format!("CSV export failed: {}", e)).into())
        }
    }
}

/// Parses a snapshot produced by [`render`]
pub fn parse(format: ExportFormat, data: &str) -> Result<Vec<SessionView>> {
    match format {
        ExportFormat::Json => {
            let snapshot: JsonSnapshot = serde_json::from_str(data)
                .map_err(|e| NotetionError::MalformedInput(format!("Invalid JSON export: {}", e)))?;
            if snapshot.version > SNAPSHOT_VERSION {
                return Err(NotetionError::MalformedInput(format!(
                    "Unsupported export version {}",
                    snapshot.version
                ))
                .into());
            }
            Ok(snapshot.sessions)
        }
        ExportFormat::Csv => {
            let mut reader = csv::Reader::from_reader(data.as_bytes());
            let mut views = Vec::new();
            for row in reader.deserialize::<CsvRow>() {
                let row = row
                    .map_err(|e| NotetionError::MalformedInput(format!("Invalid CSV export: {}", e)))?;
                views.push(row.into_view()?);
            }
            Ok(views)
        }
    }
}
