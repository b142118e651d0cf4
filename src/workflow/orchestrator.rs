//! Session orchestration
//!
//! Drives one note-generation session through the state machine:
//!
//! 1. Validate the request; invalid requests are rejected without a record
//! 2. Parse every file, keeping per-file outcomes
//! 3. Count input tokens and check the model against the pricing table
//! 4. Generate the note with retry
//! 5. Write the session, its files and its note in one transaction
//!
//! Every run that passes validation and is not cancelled leaves exactly one
//! terminal session record. Cancellation before `Recording` leaves none.

use super::metrics::SessionMetrics;
use super::state::{SessionState, StateMachine};
use crate::config::Config;
use crate::error::{FailureKind, NotetionError, Result};
use crate::estimator::{CostEstimate, CostEstimator, PricingTable, TokenCount};
use crate::generation::{validate_creativity, GenerationClient};
use crate::parser::{self, DocumentKind, DocumentParser};
use crate::prompts;
use crate::providers::{Provider, TokenUsage};
use crate::storage::{
    FileRecord, FileStatus, NewSession, NoteRecord, SessionCompletion, SessionStatus,
    SessionTotals, SqliteStorage,
};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_PREVIEW_CHARS: usize = 500;

/// One input document handed to a session
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Display name, usually the file name
    pub name: String,
    /// Declared type
    pub kind: DocumentKind,
    /// Raw bytes; empty when the file was rejected before reading
    pub bytes: Vec<u8>,
    /// Size of the source in bytes
    pub size_bytes: u64,
    rejection: Option<(FailureKind, String)>,
}

impl InputFile {
    /// Create an input from in-memory bytes
    pub fn new(name: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            size_bytes: bytes.len() as u64,
            bytes,
            rejection: None,
        }
    }

    /// An input whose size exceeds `limit`; its bytes are never loaded
    pub fn oversized(name: impl Into<String>, kind: DocumentKind, size: u64, limit: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes: Vec::new(),
            size_bytes: size,
            rejection: Some((
                FailureKind::InputTooLarge,
                NotetionError::InputTooLarge { size, limit }.to_string(),
            )),
        }
    }

    /// An input that could not be read from disk
    pub fn unreadable(name: impl Into<String>, kind: DocumentKind, detail: String) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes: Vec::new(),
            size_bytes: 0,
            rejection: Some((FailureKind::UnsupportedContent, detail)),
        }
    }

    /// Failure recorded for this file without parsing it
    pub fn rejection(&self) -> Option<FailureKind> {
        self.rejection.as_ref().map(|(kind, _)| *kind)
    }

    /// Read a file from disk, deriving the kind from its extension
    ///
    /// The size is checked against `max_bytes` before reading. Oversized and
    /// unreadable files come back as rejected inputs so the session records
    /// them as failed files.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedContent` for unknown extensions.
    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self> {
        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            NotetionError::UnsupportedContent(format!(
                "Unsupported file type: {}",
                path.display()
            ))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!("Failed to stat {}: {}", path.display(), e);
                return Ok(Self::unreadable(
                    name,
                    kind,
                    format!("Failed to read {}: {}", path.display(), e),
                ));
            }
        };
        if size > max_bytes {
            tracing::warn!(
                "Skipping {}: {} bytes exceeds the {} byte limit",
                path.display(),
                size,
                max_bytes
            );
            return Ok(Self::oversized(name, kind, size, max_bytes));
        }

        match std::fs::read(path) {
            Ok(bytes) => Ok(Self::new(name, kind, bytes)),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Ok(Self::unreadable(
                    name,
                    kind,
                    format!("Failed to read {}: {}", path.display(), e),
                ))
            }
        }
    }
}

/// Outcome for one input file
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    /// Record persisted for the file
    pub record: FileRecord,
    /// Earlier file in the same batch with identical content
    pub duplicate_of: Option<String>,
}

/// Final result of a session that reached a terminal state
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub session_id: String,
    pub status: SessionStatus,
    pub model: String,
    pub creativity: f64,
    /// Generated note, present only on success
    pub note: Option<String>,
    pub note_hash: Option<String>,
    pub input_tokens: TokenCount,
    pub output_tokens: TokenCount,
    pub cost: CostEstimate,
    pub failure: Option<FailureKind>,
    pub failure_detail: Option<String>,
    pub files: Vec<FileOutcome>,
    /// States visited, oldest first
    pub transitions: Vec<SessionState>,
    /// Usage as reported by the provider, kept apart from the estimate
    pub provider_usage: Option<TokenUsage>,
    pub generation_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionResult {
    /// Whether a note was produced
    pub fn is_success(&self) -> bool {
        self.status == SessionStatus::Succeeded
    }

    /// Estimated cost of the session
    pub fn total_cost(&self) -> f64 {
        self.cost.total()
    }
}

/// Why a run stopped before producing a note
enum Halt {
    /// Stop without writing a record
    Abort(anyhow::Error),
    /// Stop and record a failed session
    Fail(FailureKind, String),
}

fn cancelled() -> Halt {
    Halt::Abort(NotetionError::Cancelled.into())
}

/// Mutable bookkeeping of one run
struct SessionRun {
    session: NewSession,
    machine: StateMachine,
    files: Vec<FileOutcome>,
    input: TokenCount,
    output: TokenCount,
    cost: CostEstimate,
    provider_usage: Option<TokenUsage>,
    attempts: u32,
}

impl SessionRun {
    fn new(session: NewSession) -> Self {
        let machine = StateMachine::new(session.id.clone());
        Self {
            session,
            machine,
            files: Vec::new(),
            input: TokenCount::default(),
            output: TokenCount::default(),
            cost: CostEstimate::default(),
            provider_usage: None,
            attempts: 0,
        }
    }

    fn advance(&mut self, to: SessionState) -> std::result::Result<(), Halt> {
        self.machine.transition(to).map_err(Halt::Abort)
    }

    fn totals(&self) -> SessionTotals {
        SessionTotals {
            input_tokens: self.input.tokens,
            output_tokens: self.output.tokens,
            tokens_approximate: self.input.approximate || self.output.approximate,
            estimated_cost: self.cost.total(),
        }
    }

    fn into_result(self, completion: SessionCompletion) -> SessionResult {
        let (note, note_hash) = match completion.note {
            Some(note) => (Some(note.content), Some(note.content_hash)),
            None => (None, None),
        };
        SessionResult {
            session_id: self.session.id,
            status: completion.status,
            model: self.session.model,
            creativity: self.session.creativity,
            note,
            note_hash,
            input_tokens: self.input,
            output_tokens: self.output,
            cost: self.cost,
            failure: completion.failure,
            failure_detail: completion.failure_detail,
            files: self.files,
            transitions: self.machine.history().to_vec(),
            provider_usage: self.provider_usage,
            generation_attempts: self.attempts,
            started_at: self.session.started_at,
            ended_at: completion.ended_at,
        }
    }
}

/// Runs sessions against a parser, estimator, generator and store
///
/// Cheap to clone; clones share the provider and the pricing table, so one
/// orchestrator can serve concurrent sessions.
#[derive(Clone)]
pub struct Orchestrator {
    parser: DocumentParser,
    estimator: CostEstimator,
    generator: GenerationClient,
    storage: SqliteStorage,
    preview_chars: usize,
}

impl Orchestrator {
    /// Create an orchestrator from its parts
    pub fn new(
        parser: DocumentParser,
        estimator: CostEstimator,
        generator: GenerationClient,
        storage: SqliteStorage,
    ) -> Self {
        Self {
            parser,
            estimator,
            generator,
            storage,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    /// Build an orchestrator from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the pricing table cannot be loaded
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn Provider>,
        storage: SqliteStorage,
    ) -> Result<Self> {
        let pricing = PricingTable::from_config(&config.pricing)?;
        let generator = GenerationClient::new(provider, config.retry.clone())
            .with_max_output_tokens(config.workflow.max_output_tokens);

        Ok(Self::new(
            DocumentParser::new(config.workflow.max_file_size_bytes),
            CostEstimator::with_tiktoken(pricing),
            generator,
            storage,
        )
        .with_preview_chars(config.workflow.preview_chars))
    }

    /// Set the number of characters kept as a file preview
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// The session store
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// The token and cost estimator
    pub fn estimator(&self) -> &CostEstimator {
        &self.estimator
    }

    /// Run a session to completion
    ///
    /// See [`Orchestrator::run_session_with_cancel`].
    pub async fn run_session(
        &self,
        files: Vec<InputFile>,
        model: &str,
        creativity: f64,
    ) -> Result<SessionResult> {
        self.run_session_with_cancel(files, model, creativity, &CancellationToken::new())
            .await
    }

    /// Run a session, stopping early if `cancel` fires
    ///
    /// # Returns
    ///
    /// `Ok` with a succeeded or failed [`SessionResult`] once the terminal
    /// record is written.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` for an empty file list, a blank model or an
    ///   out-of-range creativity; nothing is recorded
    /// - `Cancelled` when `cancel` fires before `Recording`; nothing is recorded
    /// - `StorageFailure` when the terminal record cannot be written
    pub async fn run_session_with_cancel(
        &self,
        files: Vec<InputFile>,
        model: &str,
        creativity: f64,
        cancel: &CancellationToken,
    ) -> Result<SessionResult> {
        let metrics = SessionMetrics::new(model);
        let mut run = SessionRun::new(NewSession::new(model, creativity));
        tracing::info!(
            "Starting session {}: model={}, files={}, creativity={}",
            run.session.id,
            model,
            files.len(),
            creativity
        );

        match self.drive(&mut run, files, cancel).await {
            Ok(note) => self.record_success(run, note, &metrics).await,
            Err(Halt::Fail(kind, detail)) => self.record_failure(run, kind, detail, &metrics).await,
            Err(Halt::Abort(err)) => {
                run.machine.fail();
                let status = match FailureKind::of(&err) {
                    Some(FailureKind::Cancelled) => "cancelled",
                    _ => "invalid",
                };
                metrics.record_completion(status, 0, 0);
                tracing::warn!("Session {} stopped without a record: {}", run.session.id, err);
                Err(err)
            }
        }
    }

    /// Runs every cancellable stage; returns the generated note
    async fn drive(
        &self,
        run: &mut SessionRun,
        files: Vec<InputFile>,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, Halt> {
        let model = run.session.model.clone();

        run.advance(SessionState::Validating)?;
        validate_request(&files, &model, run.session.creativity).map_err(Halt::Abort)?;
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        run.advance(SessionState::Parsing)?;
        let documents = self.parse_files(run, files, cancel).await?;
        if documents.is_empty() {
            return Err(Halt::Fail(
                FailureKind::NoUsableInput,
                format!("All {} input files failed to parse", run.files.len()),
            ));
        }

        run.advance(SessionState::Estimating)?;
        if let Err(e) = self.estimator.pricing().rate(&model) {
            return Err(Halt::Fail(FailureKind::UnknownModel, e.to_string()));
        }
        let joined = documents
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        run.input = self.count_tokens(joined, &model, cancel).await?;
        run.cost = self.cost(run.input.tokens, 0, &model)?;
        tracing::debug!(
            "Session {}: {} input tokens{}, estimated input cost {:.6}",
            run.session.id,
            run.input.tokens,
            if run.input.approximate { " (approximate)" } else { "" },
            run.cost.input_cost
        );

        run.advance(SessionState::Generating)?;
        let prompt = prompts::combine_documents(
            documents.iter().map(|(name, text)| (name.as_str(), text.as_str())),
        );
        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = self.generator.generate(&prompt, &model, run.session.creativity) => result,
        };
        let output = generated.map_err(|e| {
            let kind = FailureKind::of(&e).unwrap_or(FailureKind::ProviderUnavailable);
            Halt::Fail(kind, e.to_string())
        })?;
        run.provider_usage = output.usage;
        run.attempts = output.attempts;

        if output.text.trim().is_empty() {
            return Err(Halt::Fail(
                FailureKind::ContentRejected,
                "Provider returned an empty note".to_string(),
            ));
        }

        run.output = self.count_tokens(output.text.clone(), &model, cancel).await?;
        run.cost = self.cost(run.input.tokens, run.output.tokens, &model)?;

        Ok(output.text)
    }

    /// Parses each file off the runtime; returns `(name, text)` of the usable ones
    async fn parse_files(
        &self,
        run: &mut SessionRun,
        files: Vec<InputFile>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<(String, String)>, Halt> {
        let mut documents = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for file in files {
            let InputFile {
                name,
                kind,
                bytes,
                size_bytes,
                rejection,
            } = file;

            if let Some((failure, detail)) = rejection {
                tracing::warn!("Rejected {}: {}", name, detail);
                run.files.push(FileOutcome {
                    record: FileRecord {
                        name,
                        kind,
                        size_bytes,
                        content_hash: String::new(),
                        preview: String::new(),
                        status: FileStatus::Failed,
                        failure: Some(failure),
                        failure_detail: Some(detail),
                    },
                    duplicate_of: None,
                });
                continue;
            }

            let parser = self.parser;
            let task = tokio::task::spawn_blocking(move || {
                let parsed = parser.parse(&bytes, kind);
                let hash = match &parsed {
                    Ok(doc) => doc.content_hash.clone(),
                    Err(_) => parser::content_hash(&bytes),
                };
                (hash, parsed)
            });

            let (content_hash, parsed) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                joined = task => joined.map_err(|e| {
                    Halt::Abort(anyhow::anyhow!("Parser task for {} failed: {}", name, e))
                })?,
            };

            let duplicate_of = seen.get(&content_hash).cloned();
            if let Some(original) = &duplicate_of {
                tracing::info!("{} has the same content as {}", name, original);
            } else {
                seen.insert(content_hash.clone(), name.clone());
            }

            let record = match parsed {
                Ok(doc) => {
                    let preview = parser::preview(&doc.text, self.preview_chars);
                    documents.push((name.clone(), doc.text));
                    FileRecord {
                        name,
                        kind,
                        size_bytes,
                        content_hash,
                        preview,
                        status: FileStatus::Parsed,
                        failure: None,
                        failure_detail: None,
                    }
                }
                Err(e) => {
                    let failure = FailureKind::of(&e).unwrap_or(FailureKind::UnsupportedContent);
                    tracing::warn!("Failed to parse {}: {}", name, e);
                    FileRecord {
                        name,
                        kind,
                        size_bytes,
                        content_hash,
                        preview: String::new(),
                        status: FileStatus::Failed,
                        failure: Some(failure),
                        failure_detail: Some(e.to_string()),
                    }
                }
            };
            run.files.push(FileOutcome {
                record,
                duplicate_of,
            });
        }

        Ok(documents)
    }

    async fn count_tokens(
        &self,
        text: String,
        model: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<TokenCount, Halt> {
        let estimator = self.estimator.clone();
        let model = model.to_string();
        let task = tokio::task::spawn_blocking(move || estimator.count_tokens(&text, &model));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled()),
            joined = task => joined.map_err(|e| {
                Halt::Abort(anyhow::anyhow!("Tokenizer task failed: {}", e))
            }),
        }
    }

    fn cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        model: &str,
    ) -> std::result::Result<CostEstimate, Halt> {
        self.estimator
            .estimate_cost(input_tokens, output_tokens, model)
            .map_err(|e| {
                let kind = FailureKind::of(&e).unwrap_or(FailureKind::UnknownModel);
                Halt::Fail(kind, e.to_string())
            })
    }

    async fn record_success(
        &self,
        mut run: SessionRun,
        note: String,
        metrics: &SessionMetrics,
    ) -> Result<SessionResult> {
        run.machine.transition(SessionState::Recording)?;
        let ended_at = Utc::now();
        let completion = SessionCompletion {
            ended_at,
            status: SessionStatus::Succeeded,
            totals: run.totals(),
            failure: None,
            failure_detail: None,
            note: Some(NoteRecord::new(note, ended_at)),
        };

        if let Err(e) = self.persist(&run, &completion).await {
            run.machine.fail();
            metrics.record_completion("failed", run.input.tokens, run.output.tokens);
            tracing::error!("Session {} could not be recorded: {:#}", run.session.id, e);
            return Err(e);
        }

        run.machine.transition(SessionState::Succeeded)?;
        metrics.record_completion("succeeded", run.input.tokens, run.output.tokens);
        tracing::info!(
            "Session {} succeeded: {} input / {} output tokens, cost {:.6}",
            run.session.id,
            run.input.tokens,
            run.output.tokens,
            run.cost.total()
        );

        Ok(run.into_result(completion))
    }

    async fn record_failure(
        &self,
        mut run: SessionRun,
        kind: FailureKind,
        detail: String,
        metrics: &SessionMetrics,
    ) -> Result<SessionResult> {
        run.machine.fail();
        let completion = SessionCompletion {
            ended_at: Utc::now(),
            status: SessionStatus::Failed,
            totals: run.totals(),
            failure: Some(kind),
            failure_detail: Some(detail),
            note: None,
        };

        let persisted = self.persist(&run, &completion).await;
        metrics.record_completion("failed", run.input.tokens, run.output.tokens);
        if let Err(e) = persisted {
            tracing::error!("Session {} could not be recorded: {:#}", run.session.id, e);
            return Err(e);
        }

        tracing::warn!(
            "Session {} failed: {}: {}",
            run.session.id,
            kind,
            completion.failure_detail.as_deref().unwrap_or_default()
        );
        Ok(run.into_result(completion))
    }

    /// Writes the terminal record in one transaction
    async fn persist(&self, run: &SessionRun, completion: &SessionCompletion) -> Result<()> {
        let storage = self.storage.clone();
        let session = run.session.clone();
        let files: Vec<FileRecord> = run.files.iter().map(|f| f.record.clone()).collect();
        let completion = completion.clone();

        let written = tokio::task::spawn_blocking(move || {
            storage.record_session(&session, &files, &completion)
        })
        .await
        .map_err(|e| NotetionError::Storage(format!("Recording task failed: {}", e)))?;

        match written {
            Ok(_) => Ok(()),
            Err(e) if FailureKind::of(&e) == Some(FailureKind::StorageFailure) => Err(e),
            Err(e) => Err(NotetionError::Storage(format!("{:#}", e)).into()),
        }
    }
}

fn validate_request(files: &[InputFile], model: &str, creativity: f64) -> Result<()> {
    if files.is_empty() {
        return Err(
            NotetionError::InvalidParameter("At least one input file is required".into()).into(),
        );
    }
    if model.trim().is_empty() {
        return Err(NotetionError::InvalidParameter("Model must not be empty".into()).into());
    }
    if let Some(file) = files.iter().find(|f| f.name.trim().is_empty()) {
        return Err(NotetionError::InvalidParameter(format!(
            "Input file of type {} has no name",
            file.kind
        ))
        .into());
    }
    validate_creativity(creativity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelRate, RetryConfig};
    use crate::estimator::Tokenizer;
    use crate::providers::{CompletionRequest, CompletionResponse, MockProvider};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    struct BrokenTokenizer;

    impl Tokenizer for BrokenTokenizer {
        fn count(&self, _text: &str, model: &str) -> Result<u64> {
            anyhow::bail!("no encoding for {}", model)
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(CompletionResponse::new("# too late"))
        }
    }

    fn pricing() -> PricingTable {
        let mut rates = BTreeMap::new();
        rates.insert(
            "gpt-4".to_string(),
            ModelRate {
                input_per_1k: 0.03,
                output_per_1k: 0.06,
            },
        );
        PricingTable::new("test", rates)
    }

    fn orchestrator(provider: Arc<dyn Provider>) -> (TempDir, Orchestrator) {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new_with_path(dir.path().join("history.db")).unwrap();
        let retry = RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        };
        let orchestrator = Orchestrator::new(
            DocumentParser::new(1024 * 1024),
            CostEstimator::new(Arc::new(BrokenTokenizer), pricing()),
            GenerationClient::new(provider, retry),
            storage,
        );
        (dir, orchestrator)
    }

    fn replying(text: &'static str) -> Arc<dyn Provider> {
        let mut mock = MockProvider::new();
        mock.expect_complete()
            .returning(move |_| Ok(CompletionResponse::new(text)));
        Arc::new(mock)
    }

    fn never_called() -> Arc<dyn Provider> {
        let mut mock = MockProvider::new();
        mock.expect_complete().times(0);
        Arc::new(mock)
    }

    fn txt(name: &str, body: &str) -> InputFile {
        InputFile::new(name, DocumentKind::Txt, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_success_walks_every_state() {
        let (_dir, orchestrator) = orchestrator(replying("# Notes\n- one"));
        let result = orchestrator
            .run_session(vec![txt("lecture.txt", &"a".repeat(800))], "gpt-4", 0.2)
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(
            result.transitions,
            vec![
                SessionState::Created,
                SessionState::Validating,
                SessionState::Parsing,
                SessionState::Estimating,
                SessionState::Generating,
                SessionState::Recording,
                SessionState::Succeeded,
            ]
        );
        assert_eq!(result.input_tokens, TokenCount::approximate_for(&"a".repeat(800)));
        assert_eq!(result.input_tokens.tokens, 200);
        assert!(result.input_tokens.approximate);

        let expected = 200.0 / 1000.0 * 0.03 + result.output_tokens.tokens as f64 / 1000.0 * 0.06;
        assert!((result.total_cost() - expected).abs() < 1e-12);

        let view = orchestrator
            .storage()
            .get_session(&result.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(view.session.status, SessionStatus::Succeeded);
        assert_eq!(view.files.len(), 1);
        assert_eq!(view.note.unwrap().content, "# Notes\n- one");
    }

    #[tokio::test]
    async fn test_invalid_creativity_leaves_no_record() {
        let (_dir, orchestrator) = orchestrator(never_called());
        let err = orchestrator
            .run_session(vec![txt("a.txt", "text")], "gpt-4", 1.5)
            .await
            .unwrap_err();
        assert_eq!(FailureKind::of(&err), Some(FailureKind::InvalidParameter));
        assert_eq!(orchestrator.storage().count_sessions().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_request_is_invalid() {
        let (_dir, orchestrator) = orchestrator(never_called());
        let err = orchestrator.run_session(vec![], "gpt-4", 0.2).await.unwrap_err();
        assert_eq!(FailureKind::of(&err), Some(FailureKind::InvalidParameter));
        let err = orchestrator
            .run_session(vec![txt("a.txt", "text")], "  ", 0.2)
            .await
            .unwrap_err();
        assert_eq!(FailureKind::of(&err), Some(FailureKind::InvalidParameter));
        assert_eq!(orchestrator.storage().count_sessions().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_among_text_files() {
        let (_dir, orchestrator) = orchestrator(replying("# Notes"));
        let files = vec![
            txt("one.txt", "first lecture"),
            txt("two.txt", "second lecture"),
            InputFile::new("broken.pdf", DocumentKind::Pdf, b"%PDF-1.4 garbage".to_vec()),
        ];
        let result = orchestrator.run_session(files, "gpt-4", 0.3).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.files.len(), 3);
        let pdf = &result.files[2].record;
        assert_eq!(pdf.status, FileStatus::Failed);
        assert!(pdf.failure.is_some());
        assert_eq!(pdf.content_hash, parser::content_hash(b"%PDF-1.4 garbage"));

        let view = orchestrator
            .storage()
            .get_session(&result.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(view.files.len(), 3);
    }

    #[tokio::test]
    async fn test_all_files_failing_records_no_usable_input() {
        let (_dir, orchestrator) = orchestrator(never_called());
        let files = vec![
            InputFile::new("bad.json", DocumentKind::Json, b"{not json".to_vec()),
            InputFile::new("bad.txt", DocumentKind::Txt, vec![0xff, 0xfe, 0x00]),
        ];
        let result = orchestrator.run_session(files, "gpt-4", 0.3).await.unwrap();

        assert_eq!(result.status, SessionStatus::Failed);
        assert_eq!(result.failure, Some(FailureKind::NoUsableInput));
        assert_eq!(result.transitions.last(), Some(&SessionState::Failed));
        assert!(result.note.is_none());
        assert_eq!(result.input_tokens.tokens, 0);

        let view = orchestrator
            .storage()
            .get_session(&result.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(view.session.failure, Some(FailureKind::NoUsableInput));
        assert_eq!(view.files.len(), 2);
        assert!(view.note.is_none());
    }

    #[tokio::test]
    async fn test_unknown_model_is_recorded_as_failure() {
        let (_dir, orchestrator) = orchestrator(never_called());
        let result = orchestrator
            .run_session(vec![txt("a.txt", "text")], "gpt-5-imaginary", 0.3)
            .await
            .unwrap();
        assert_eq!(result.failure, Some(FailureKind::UnknownModel));
        assert_eq!(result.total_cost(), 0.0);
        assert_eq!(orchestrator.storage().count_sessions().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_provider_rejection_keeps_input_cost() {
        let mut mock = MockProvider::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Err(NotetionError::ContentRejected("policy".into()).into()));
        let (_dir, orchestrator) = orchestrator(Arc::new(mock));

        let result = orchestrator
            .run_session(vec![txt("a.txt", &"b".repeat(400))], "gpt-4", 0.3)
            .await
            .unwrap();
        assert_eq!(result.failure, Some(FailureKind::ContentRejected));
        assert_eq!(result.input_tokens.tokens, 100);
        assert_eq!(result.output_tokens.tokens, 0);
        assert!((result.total_cost() - 0.003).abs() < 1e-12);
        assert_eq!(
            &result.transitions[result.transitions.len() - 2..],
            &[SessionState::Generating, SessionState::Failed]
        );
    }

    #[tokio::test]
    async fn test_empty_generation_is_rejected() {
        let (_dir, orchestrator) = orchestrator(replying("   \n"));
        let result = orchestrator
            .run_session(vec![txt("a.txt", "text")], "gpt-4", 0.3)
            .await
            .unwrap();
        assert_eq!(result.failure, Some(FailureKind::ContentRejected));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_records_nothing() {
        let (_dir, orchestrator) = orchestrator(never_called());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orchestrator
            .run_session_with_cancel(vec![txt("a.txt", "text")], "gpt-4", 0.3, &cancel)
            .await
            .unwrap_err();
        assert_eq!(FailureKind::of(&err), Some(FailureKind::Cancelled));
        assert_eq!(orchestrator.storage().count_sessions().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_generation_records_nothing() {
        let (_dir, orchestrator) = orchestrator(Arc::new(SlowProvider));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = orchestrator
            .run_session_with_cancel(vec![txt("a.txt", "text")], "gpt-4", 0.3, &cancel)
            .await
            .unwrap_err();
        assert_eq!(FailureKind::of(&err), Some(FailureKind::Cancelled));
        assert_eq!(orchestrator.storage().count_sessions().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_files_are_flagged() {
        let (_dir, orchestrator) = orchestrator(replying("# Notes"));
        let files = vec![
            txt("a.txt", "same body"),
            txt("b.txt", "other body"),
            txt("copy-of-a.txt", "same body"),
        ];
        let result = orchestrator.run_session(files, "gpt-4", 0.3).await.unwrap();
        assert_eq!(result.files[0].duplicate_of, None);
        assert_eq!(result.files[1].duplicate_of, None);
        assert_eq!(result.files[2].duplicate_of.as_deref(), Some("a.txt"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let (dir, orchestrator) = orchestrator(replying("# Notes"));
        let db_path = dir.path().join("history.db");
        std::fs::remove_file(&db_path).unwrap();
        std::fs::create_dir(&db_path).unwrap();

        let err = orchestrator
            .run_session(vec![txt("a.txt", "text")], "gpt-4", 0.3)
            .await
            .unwrap_err();
        assert_eq!(FailureKind::of(&err), Some(FailureKind::StorageFailure));
    }

    #[test]
    fn test_input_file_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Notes.TXT");
        std::fs::write(&path, "hello").unwrap();
        let input = InputFile::from_path(&path, 1024).unwrap();
        assert_eq!(input.name, "Notes.TXT");
        assert_eq!(input.kind, DocumentKind::Txt);
        assert_eq!(input.bytes, b"hello");
        assert_eq!(input.rejection(), None);

        let png = dir.path().join("figure.png");
        std::fs::write(&png, [0u8; 4]).unwrap();
        let err = InputFile::from_path(&png, 1024).unwrap_err();
        assert_eq!(FailureKind::of(&err), Some(FailureKind::UnsupportedContent));
    }

    #[test]
    fn test_input_file_over_limit_is_not_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.txt");
        std::fs::write(&path, "z".repeat(64)).unwrap();

        let input = InputFile::from_path(&path, 16).unwrap();
        assert!(input.bytes.is_empty());
        assert_eq!(input.size_bytes, 64);
        assert_eq!(input.rejection(), Some(FailureKind::InputTooLarge));
    }

    #[tokio::test]
    async fn test_oversized_file_recorded_as_failed() {
        let (_dir, orchestrator) = orchestrator(replying("# Notes"));
        let files = vec![
            txt("small.txt", "fits"),
            InputFile::oversized("huge.pdf", DocumentKind::Pdf, 10 * 1024 * 1024 * 1024, 1024),
        ];
        let result = orchestrator.run_session(files, "gpt-4", 0.3).await.unwrap();
        assert!(result.is_success());

        let view = orchestrator
            .storage()
            .get_session(&result.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(view.files[1].status, FileStatus::Failed);
        assert_eq!(view.files[1].failure, Some(FailureKind::InputTooLarge));
        assert_eq!(view.files[1].size_bytes, 10 * 1024 * 1024 * 1024);
    }
}
