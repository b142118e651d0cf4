//! Export, import and retention cleanup commands

use super::default_export_path;
use crate::error::{NotetionError, Result};
use crate::storage::{ExportFormat, ImportReport, SqliteStorage};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Write every session to `output`, or to a timestamped file
///
/// Returns the path written.
pub fn export_sessions(
    storage: &SqliteStorage,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let data = storage.export(format)?;
    let path = output.unwrap_or_else(|| default_export_path(format.extension()));
    std::fs::write(&path, data)?;

    println!(
        "{}",
        format!("Exported sessions to {}", path.display()).green()
    );
    Ok(path)
}

/// Import a previous export
///
/// The format defaults to the file extension.
pub fn import_sessions(
    storage: &SqliteStorage,
    file: &Path,
    format: Option<ExportFormat>,
) -> Result<ImportReport> {
    let format = match format {
        Some(format) => format,
        None => format_from_extension(file)?,
    };
    let data = std::fs::read_to_string(file)?;
    let report = storage.import(format, &data)?;

    println!(
        "{}",
        format!(
            "Imported {} sessions ({} files, {} notes) from {}",
            report.sessions,
            report.files,
            report.notes,
            file.display()
        )
        .green()
    );
    Ok(report)
}

/// Delete sessions older than `days`
pub fn cleanup(storage: &SqliteStorage, days: u32) -> Result<usize> {
    let removed = storage.cleanup(days)?;
    if removed == 0 {
        println!("{}", format!("No sessions older than {} days.", days).yellow());
    } else {
        println!(
            "{}",
            format!("Removed {} sessions older than {} days.", removed, days).green()
        );
    }
    Ok(removed)
}

fn format_from_extension(file: &Path) -> Result<ExportFormat> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    ext.parse::<ExportFormat>().map_err(|_| {
        anyhow::Error::from(NotetionError::InvalidParameter(format!(
            "Cannot infer import format from {}; pass --format csv|json",
            file.display()
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewSession, NoteRecord, SessionCompletion, SessionStatus, SessionTotals};
    use chrono::Utc;
    use tempfile::tempdir;

    fn seeded(dir: &Path) -> SqliteStorage {
        let storage = SqliteStorage::new_with_path(dir.join("history.db")).unwrap();
        let session = NewSession::new("gpt-4", 0.3);
        let completion = SessionCompletion {
            ended_at: Utc::now(),
            status: SessionStatus::Succeeded,
            totals: SessionTotals::default(),
            failure: None,
            failure_detail: None,
            note: Some(NoteRecord::new("# Notes", Utc::now())),
        };
        storage.record_session(&session, &[], &completion).unwrap();
        storage
    }

    #[test]
    fn test_export_then_import_by_extension() {
        let dir = tempdir().unwrap();
        let storage = seeded(dir.path());
        let path = dir.path().join("snapshot.csv");

        export_sessions(&storage, ExportFormat::Csv, Some(path.clone())).unwrap();
        let report = import_sessions(&storage, &path, None).unwrap();
        assert_eq!(report.sessions, 1);
        assert_eq!(report.notes, 1);
        assert_eq!(storage.count_sessions().unwrap(), 2);
    }

    #[test]
    fn test_import_unknown_extension_needs_format() {
        let dir = tempdir().unwrap();
        let storage = seeded(dir.path());
        let path = dir.path().join("snapshot.bak");
        std::fs::write(&path, "[]").unwrap();
        assert!(import_sessions(&storage, &path, None).is_err());
    }

    #[test]
    fn test_cleanup_zero_days_removes_all() {
        let dir = tempdir().unwrap();
        let storage = seeded(dir.path());
        assert_eq!(cleanup(&storage, 0).unwrap(), 1);
        assert_eq!(storage.count_sessions().unwrap(), 0);
    }
}
