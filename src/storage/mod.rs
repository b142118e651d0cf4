//! Session store backed by SQLite
//!
//! Three tables: `sessions`, `files`, and `notes`, with files and notes
//! owned by their session. Every operation opens its own connection and
//! runs in a single transaction, so readers never observe a session in the
//! middle of a write. Write transactions are `IMMEDIATE` and wait on the
//! busy timeout, which serializes concurrent writers.

use crate::config::StorageConfig;
use crate::error::{NotetionError, Result};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, ToSql, Transaction,
    TransactionBehavior,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

pub mod export;
pub mod types;
pub use types::{
    ExportFormat, FileOccurrence, FileRecord, FileStatus, ImportReport, NewSession, NoteRecord,
    SearchQuery, SessionCompletion, SessionStatus, SessionSummary, SessionTotals, SessionView,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        model TEXT NOT NULL,
        creativity REAL NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('running', 'succeeded', 'failed')),
        input_tokens INTEGER NOT NULL DEFAULT 0,
        output_tokens INTEGER NOT NULL DEFAULT 0,
        tokens_approximate INTEGER NOT NULL DEFAULT 0,
        estimated_cost REAL NOT NULL DEFAULT 0,
        failure_kind TEXT,
        failure_detail TEXT,
        processing_time REAL,
        note_length INTEGER
    );
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        content_hash TEXT NOT NULL,
        preview TEXT NOT NULL,
        status TEXT NOT NULL,
        failure_kind TEXT,
        failure_detail TEXT
    );
    CREATE TABLE IF NOT EXISTS notes (
        session_id TEXT PRIMARY KEY REFERENCES sessions(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);
    CREATE INDEX IF NOT EXISTS idx_files_session ON files(session_id);
    CREATE INDEX IF NOT EXISTS idx_files_hash ON files(content_hash);
    CREATE INDEX IF NOT EXISTS idx_notes_hash ON notes(content_hash);
";

const SUMMARY_COLUMNS: &str = "s.id, s.started_at, s.ended_at, s.model, s.creativity, s.status,
    s.input_tokens, s.output_tokens, s.tokens_approximate, s.estimated_cost,
    s.failure_kind, s.failure_detail, s.processing_time, s.note_length,
    (SELECT COUNT(*) FROM files f WHERE f.session_id = s.id)";

fn storage_err(e: anyhow::Error) -> NotetionError {
    NotetionError::Storage(format!("{:#}", e))
}

/// Fixed-width RFC 3339 form so stored timestamps sort lexicographically
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn like_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SessionSummary> {
    let started_at: String = row.get(1)?;
    let ended_at: Option<String> = row.get(2)?;
    let status: String = row.get(5)?;
    let failure: Option<String> = row.get(10)?;
    let note_length: Option<i64> = row.get(13)?;
    let file_count: i64 = row.get(14)?;

    Ok(SessionSummary {
        id: row.get(0)?,
        started_at: parse_ts(1, &started_at)?,
        ended_at: ended_at.map(|s| parse_ts(2, &s)).transpose()?,
        model: row.get(3)?,
        creativity: row.get(4)?,
        status: parse_column(5, &status)?,
        totals: SessionTotals {
            input_tokens: row.get::<_, i64>(6)? as u64,
            output_tokens: row.get::<_, i64>(7)? as u64,
            tokens_approximate: row.get(8)?,
            estimated_cost: row.get(9)?,
        },
        failure: failure.map(|s| parse_column(10, &s)).transpose()?,
        failure_detail: row.get(11)?,
        processing_time_secs: row.get(12)?,
        note_length: note_length.map(|n| n as u64),
        file_count: file_count as u64,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let kind: String = row.get(1)?;
    let status: String = row.get(5)?;
    let failure: Option<String> = row.get(6)?;
    Ok(FileRecord {
        name: row.get(0)?,
        kind: parse_column(1, &kind)?,
        size_bytes: row.get::<_, i64>(2)? as u64,
        content_hash: row.get(3)?,
        preview: row.get(4)?,
        status: parse_column(5, &status)?,
        failure: failure.map(|s| parse_column(6, &s)).transpose()?,
        failure_detail: row.get(7)?,
    })
}

/// Storage backend for processing sessions
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory, or at
    /// `NOTETION_HISTORY_DB` when that variable is set.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("NOTETION_HISTORY_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "notetion", "notetion")
            .ok_or_else(|| NotetionError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("history.db"))
    }

    /// Create a storage instance at the configured path, or the default one
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("history.db")).unwrap();
    /// assert!(storage.db_path().exists());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(storage_err)?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Path of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .context("Failed to enable WAL journal")
            .map_err(storage_err)?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create tables")
            .map_err(storage_err)?;
        tracing::debug!("Session store ready at {}", self.db_path.display());
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(storage_err)?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")
            .map_err(storage_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")
            .map_err(storage_err)?;
        register_unicode_lower(&conn)?;
        Ok(conn)
    }

    /// Runs `f` inside one write transaction and commits on success
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start transaction")
            .map_err(storage_err)?;
        let value = f(&tx)?;
        tx.commit()
            .context("Failed to commit transaction")
            .map_err(storage_err)?;
        Ok(value)
    }

    /// Runs `f` inside one read transaction, giving it a consistent snapshot
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .context("Failed to start read transaction")
            .map_err(storage_err)?;
        f(&tx)
    }

    /// Inserts a `running` session and returns its id
    pub fn create_session(&self, session: &NewSession) -> Result<String> {
        self.write(|tx| insert_session(tx, session))?;
        tracing::debug!("Created session {}", session.id);
        Ok(session.id.clone())
    }

    /// Appends a file to a `running` session
    pub fn record_file(&self, session_id: &str, file: &FileRecord) -> Result<()> {
        self.write(|tx| {
            ensure_running(tx, session_id)?;
            insert_file(tx, session_id, file)
        })
    }

    /// Moves a `running` session to its terminal state, writing the note
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the session does not exist or is no longer
    /// running, so at most one writer ever completes a session.
    pub fn complete_session(&self, session_id: &str, completion: &SessionCompletion) -> Result<()> {
        self.write(|tx| complete_in(tx, session_id, completion))?;
        tracing::debug!("Completed session {} as {}", session_id, completion.status);
        Ok(())
    }

    /// Writes a whole session (row, files, terminal state, note) atomically
    pub fn record_session(
        &self,
        session: &NewSession,
        files: &[FileRecord],
        completion: &SessionCompletion,
    ) -> Result<String> {
        self.write(|tx| {
            insert_session(tx, session)?;
            for file in files {
                insert_file(tx, &session.id, file)?;
            }
            complete_in(tx, &session.id, completion)
        })?;
        tracing::info!(
            "Recorded session {} ({}, {} files)",
            session.id,
            completion.status,
            files.len()
        );
        Ok(session.id.clone())
    }

    /// Load a session with its files and note (supports full UUID or 8-char prefix)
    pub fn get_session(&self, id: &str) -> Result<Option<SessionView>> {
        self.read(|tx| match resolve_id(tx, id)? {
            Some(full_id) => load_view(tx, &full_id),
            None => Ok(None),
        })
    }

    /// Most recent sessions first
    pub fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<SessionSummary>> {
        self.search(&SearchQuery {
            limit,
            ..SearchQuery::default()
        })
    }

    /// Sessions matching every supplied filter, newest first
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SessionSummary>> {
        let mut sql = format!("SELECT {} FROM sessions s WHERE 1 = 1", SUMMARY_COLUMNS);
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(text) = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            sql.push_str(
                " AND (EXISTS (SELECT 1 FROM notes n WHERE n.session_id = s.id
                        AND unicode_lower(n.content) LIKE ? ESCAPE '\\')
                   OR EXISTS (SELECT 1 FROM files f WHERE f.session_id = s.id
                        AND unicode_lower(f.name) LIKE ? ESCAPE '\\'))",
            );
            let pattern = format!("%{}%", like_escape(&text.to_lowercase()));
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern));
        }
        if let Some(model) = &query.model {
            sql.push_str(" AND s.model = ?");
            args.push(Box::new(model.clone()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND s.status = ?");
            args.push(Box::new(status.as_str()));
        }
        if let Some(from) = &query.from {
            sql.push_str(" AND s.started_at >= ?");
            args.push(Box::new(format_ts(from)));
        }
        if let Some(to) = &query.to {
            sql.push_str(" AND s.started_at <= ?");
            args.push(Box::new(format_ts(to)));
        }
        sql.push_str(" ORDER BY s.started_at DESC, s.id");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            args.push(Box::new(limit as i64));
        }

        self.read(|tx| {
            let mut stmt = tx
                .prepare(&sql)
                .context("Failed to prepare search")
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), summary_from_row)
                .context("Failed to query sessions")
                .map_err(storage_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read session row")
                .map_err(|e| storage_err(e).into())
        })
    }

    /// Delete a session with its files and note (supports full UUID or 8-char prefix)
    ///
    /// Returns whether a session was removed.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.write(|tx| {
            let Some(full_id) = resolve_id(tx, id)? else {
                return Ok(false);
            };
            delete_where(tx, "id = ?1", params![full_id])?;
            Ok(true)
        })
    }

    /// Earlier files with the given content hash, oldest first
    pub fn file_occurrences(&self, content_hash: &str) -> Result<Vec<FileOccurrence>> {
        self.read(|tx| {
            let mut stmt = tx
                .prepare(
                    "SELECT f.session_id, f.name, s.started_at
                     FROM files f JOIN sessions s ON s.id = f.session_id
                     WHERE f.content_hash = ?1
                     ORDER BY s.started_at, f.position",
                )
                .context("Failed to prepare statement")
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params![content_hash], |row| {
                    let started_at: String = row.get(2)?;
                    Ok(FileOccurrence {
                        session_id: row.get(0)?,
                        name: row.get(1)?,
                        started_at: parse_ts(2, &started_at)?,
                    })
                })
                .context("Failed to query files")
                .map_err(storage_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read file row")
                .map_err(|e| storage_err(e).into())
        })
    }

    /// Sessions whose note has the given content hash, oldest first
    pub fn note_occurrences(&self, content_hash: &str) -> Result<Vec<String>> {
        self.read(|tx| {
            let mut stmt = tx
                .prepare(
                    "SELECT n.session_id FROM notes n JOIN sessions s ON s.id = n.session_id
                     WHERE n.content_hash = ?1 ORDER BY s.started_at",
                )
                .context("Failed to prepare statement")
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params![content_hash], |row| row.get(0))
                .context("Failed to query notes")
                .map_err(storage_err)?;
            rows.collect::<rusqlite::Result<Vec<String>>>()
                .context("Failed to read note row")
                .map_err(|e| storage_err(e).into())
        })
    }

    /// Number of stored sessions, in any status
    pub fn count_sessions(&self) -> Result<usize> {
        self.read(|tx| {
            let count: i64 = tx
                .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .context("Failed to count sessions")
                .map_err(storage_err)?;
            Ok(count as usize)
        })
    }

    /// Serialized snapshot of all sessions, files, and notes
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        let views = self.read(load_all_views)?;
        tracing::info!("Exporting {} sessions as {}", views.len(), format.extension());
        export::render(format, &views)
    }

    /// Re-creates the records of an exported snapshot under fresh session ids
    pub fn import(&self, format: ExportFormat, data: &str) -> Result<ImportReport> {
        let views = export::parse(format, data)?;
        let report = self.write(|tx| {
            let mut report = ImportReport::default();
            for view in &views {
                let id = Uuid::new_v4().to_string();
                insert_session_row(tx, &id, &view.session)?;
                for file in &view.files {
                    insert_file(tx, &id, file)?;
                }
                if let Some(note) = &view.note {
                    insert_note(tx, &id, note)?;
                    report.notes += 1;
                }
                report.sessions += 1;
                report.files += view.files.len();
            }
            Ok(report)
        })?;
        tracing::info!(
            "Imported {} sessions, {} files, {} notes",
            report.sessions,
            report.files,
            report.notes
        );
        Ok(report)
    }

    /// Removes sessions started more than `retain_days` days ago
    ///
    /// Files and notes of removed sessions go with them. `retain_days = 0`
    /// removes every session. Returns the number of sessions removed.
    pub fn cleanup(&self, retain_days: u32) -> Result<usize> {
        let Some(cutoff) =
            Utc::now().checked_sub_signed(chrono::Duration::days(i64::from(retain_days)))
        else {
            tracing::info!("Cleanup window of {} days predates every session", retain_days);
            return Ok(0);
        };
        let removed = self.write(|tx| {
            delete_where(tx, "started_at <= ?1", params![format_ts(&cutoff)])
        })?;
        tracing::info!(
            "Cleanup removed {} sessions older than {} days",
            removed,
            retain_days
        );
        Ok(removed)
    }
}

/// `unicode_lower(text)`: full Unicode lowercasing, which SQLite's
/// built-in `lower` and `LIKE` only do for ASCII
fn register_unicode_lower(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
    .context("Failed to register unicode_lower")
    .map_err(storage_err)?;
    Ok(())
}

fn insert_session(conn: &Connection, session: &NewSession) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, started_at, model, creativity, status)
         VALUES (?1, ?2, ?3, ?4, 'running')",
        params![
            session.id,
            format_ts(&session.started_at),
            session.model,
            session.creativity
        ],
    )
    .context("Failed to insert session")
    .map_err(storage_err)?;
    Ok(())
}

fn insert_session_row(conn: &Connection, id: &str, summary: &SessionSummary) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, started_at, ended_at, model, creativity, status,
            input_tokens, output_tokens, tokens_approximate, estimated_cost,
            failure_kind, failure_detail, processing_time, note_length)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            id,
            format_ts(&summary.started_at),
            summary.ended_at.as_ref().map(format_ts),
            summary.model,
            summary.creativity,
            summary.status.as_str(),
            summary.totals.input_tokens as i64,
            summary.totals.output_tokens as i64,
            summary.totals.tokens_approximate,
            summary.totals.estimated_cost,
            summary.failure.map(|k| k.as_str()),
            summary.failure_detail,
            summary.processing_time_secs,
            summary.note_length.map(|n| n as i64),
        ],
    )
    .context("Failed to insert imported session")
    .map_err(storage_err)?;
    Ok(())
}

fn ensure_running(conn: &Connection, session_id: &str) -> Result<()> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to query session status")
        .map_err(storage_err)?;
    match status.as_deref() {
        Some("running") => Ok(()),
        Some(other) => Err(NotetionError::Storage(format!(
            "Session {} is already {}",
            session_id, other
        ))
        .into()),
        None => Err(NotetionError::Storage(format!("Session {} does not exist", session_id)).into()),
    }
}

fn insert_file(conn: &Connection, session_id: &str, file: &FileRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO files (session_id, position, name, kind, size_bytes, content_hash,
            preview, status, failure_kind, failure_detail)
         VALUES (?1,
            (SELECT COALESCE(MAX(position) + 1, 0) FROM files WHERE session_id = ?1),
            ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            session_id,
            file.name,
            file.kind.as_str(),
            file.size_bytes as i64,
            file.content_hash,
            file.preview,
            file.status.as_str(),
            file.failure.map(|k| k.as_str()),
            file.failure_detail,
        ],
    )
    .context("Failed to insert file")
    .map_err(storage_err)?;
    Ok(())
}

fn insert_note(conn: &Connection, session_id: &str, note: &NoteRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO notes (session_id, content, content_hash, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            session_id,
            note.content,
            note.content_hash,
            format_ts(&note.created_at)
        ],
    )
    .context("Failed to insert note")
    .map_err(storage_err)?;
    Ok(())
}

fn complete_in(conn: &Connection, session_id: &str, completion: &SessionCompletion) -> Result<()> {
    if !completion.status.is_terminal() {
        return Err(NotetionError::InvalidParameter(
            "A session can only be completed as succeeded or failed".to_string(),
        )
        .into());
    }
    if completion.note.is_some() && completion.status != SessionStatus::Succeeded {
        return Err(NotetionError::InvalidParameter(
            "Only succeeded sessions carry a note".to_string(),
        )
        .into());
    }

    let started_at: Option<String> = conn
        .query_row(
            "SELECT started_at FROM sessions WHERE id = ?1 AND status = 'running'",
            params![session_id],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to query session")
        .map_err(storage_err)?;
    let started_at = started_at.ok_or_else(|| {
        NotetionError::Storage(format!(
            "Session {} does not exist or is already completed",
            session_id
        ))
    })?;
    let started_at = parse_ts(0, &started_at)
        .context("Corrupt start timestamp")
        .map_err(storage_err)?;

    let ended_at = completion.ended_at.max(started_at);
    let processing_time = (ended_at - started_at)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    let note_length = completion
        .note
        .as_ref()
        .map(|n| n.content.chars().count() as i64);

    let updated = conn
        .execute(
            "UPDATE sessions SET ended_at = ?2, status = ?3, input_tokens = ?4,
                output_tokens = ?5, tokens_approximate = ?6, estimated_cost = ?7,
                failure_kind = ?8, failure_detail = ?9, processing_time = ?10,
                note_length = ?11
             WHERE id = ?1 AND status = 'running'",
            params![
                session_id,
                format_ts(&ended_at),
                completion.status.as_str(),
                completion.totals.input_tokens as i64,
                completion.totals.output_tokens as i64,
                completion.totals.tokens_approximate,
                completion.totals.estimated_cost,
                completion.failure.map(|k| k.as_str()),
                completion.failure_detail,
                processing_time,
                note_length,
            ],
        )
        .context("Failed to complete session")
        .map_err(storage_err)?;
    if updated != 1 {
        return Err(NotetionError::Storage(format!(
            "Session {} was completed concurrently",
            session_id
        ))
        .into());
    }

    if let Some(note) = &completion.note {
        insert_note(conn, session_id, note)?;
    }
    Ok(())
}

/// Resolves a full id or a unique prefix to a stored session id
fn resolve_id(conn: &Connection, id: &str) -> Result<Option<String>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(NotetionError::InvalidParameter("Session id must not be empty".into()).into());
    }
    if id.len() == 36 {
        return conn
            .query_row(
                "SELECT id FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query session")
            .map_err(|e| storage_err(e).into());
    }

    let mut stmt = conn
        .prepare("SELECT id FROM sessions WHERE id LIKE ?1 ESCAPE '\\' LIMIT 2")
        .context("Failed to prepare statement")
        .map_err(storage_err)?;
    let matches = stmt
        .query_map(params![format!("{}%", like_escape(id))], |row| row.get(0))
        .context("Failed to query session")
        .map_err(storage_err)?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("Failed to read session id")
        .map_err(storage_err)?;
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.into_iter().next()),
        _ => Err(NotetionError::InvalidParameter(format!(
            "Session id prefix '{}' is ambiguous",
            id
        ))
        .into()),
    }
}

fn load_view(conn: &Connection, id: &str) -> Result<Option<SessionView>> {
    let session = conn
        .query_row(
            &format!("SELECT {} FROM sessions s WHERE s.id = ?1", SUMMARY_COLUMNS),
            params![id],
            summary_from_row,
        )
        .optional()
        .context("Failed to query session")
        .map_err(storage_err)?;
    let Some(session) = session else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare(
            "SELECT name, kind, size_bytes, content_hash, preview, status,
                failure_kind, failure_detail
             FROM files WHERE session_id = ?1 ORDER BY position",
        )
        .context("Failed to prepare statement")
        .map_err(storage_err)?;
    let files = stmt
        .query_map(params![id], file_from_row)
        .context("Failed to query files")
        .map_err(storage_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read file row")
        .map_err(storage_err)?;

    let note = conn
        .query_row(
            "SELECT content, content_hash, created_at FROM notes WHERE session_id = ?1",
            params![id],
            |row| {
                let created_at: String = row.get(2)?;
                Ok(NoteRecord {
                    content: row.get(0)?,
                    content_hash: row.get(1)?,
                    created_at: parse_ts(2, &created_at)?,
                })
            },
        )
        .optional()
        .context("Failed to query note")
        .map_err(storage_err)?;

    Ok(Some(SessionView {
        session,
        files,
        note,
    }))
}

fn load_all_views(conn: &Transaction<'_>) -> Result<Vec<SessionView>> {
    let mut stmt = conn
        .prepare("SELECT id FROM sessions ORDER BY started_at, id")
        .context("Failed to prepare statement")
        .map_err(storage_err)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("Failed to query sessions")
        .map_err(storage_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read session id")
        .map_err(storage_err)?;

    let mut views = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(view) = load_view(conn, &id)? {
            views.push(view);
        }
    }
    Ok(views)
}

/// Deletes sessions matching `predicate` along with their files and notes
fn delete_where(conn: &Connection, predicate: &str, args: &[&dyn ToSql]) -> Result<usize> {
    conn.execute(
        &format!(
            "DELETE FROM files WHERE session_id IN (SELECT id FROM sessions WHERE {})",
            predicate
        ),
        args,
    )
    .context("Failed to delete files")
    .map_err(storage_err)?;
    conn.execute(
        &format!(
            "DELETE FROM notes WHERE session_id IN (SELECT id FROM sessions WHERE {})",
            predicate
        ),
        args,
    )
    .context("Failed to delete notes")
    .map_err(storage_err)?;
    let removed = conn
        .execute(&format!("DELETE FROM sessions WHERE {}", predicate), args)
        .context("Failed to delete sessions")
        .map_err(storage_err)?;
    Ok(removed)
}
