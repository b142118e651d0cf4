//! Integration tests for end-to-end session runs
//!
//! Drives the orchestrator with scripted providers against a temporary
//! SQLite store and checks what ends up recorded.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    create_orchestrator, BrokenTokenizer, Reply, ScriptedProvider, WordTokenizer,
};
use notetion::analytics::AnalyticsAggregator;
use notetion::error::FailureKind;
use notetion::parser::DocumentKind;
use notetion::storage::{FileStatus, SearchQuery, SessionStatus};
use notetion::workflow::{InputFile, SessionState};
use tokio_util::sync::CancellationToken;

fn txt(name: &str, body: &str) -> InputFile {
    InputFile::new(name, DocumentKind::Txt, body.as_bytes().to_vec())
}

#[tokio::test]
async fn test_single_text_file_with_fallback_tokenizer() {
    let provider = Arc::new(ScriptedProvider::replying("# Sampling\n- **Bias**: skew"));
    let (orchestrator, _tmp) = create_orchestrator(provider.clone(), Arc::new(BrokenTokenizer));

    let body = "x".repeat(800);
    let result = orchestrator
        .run_session(vec![txt("lecture.txt", &body)], "gpt-3.5-turbo", 0.2)
        .await
        .expect("session should complete");

    assert_eq!(result.status, SessionStatus::Succeeded);
    assert_eq!(result.input_tokens.tokens, 200);
    assert!(result.input_tokens.approximate);
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
    assert_eq!(provider.calls(), 1);

    let view = orchestrator
        .storage()
        .get_session(&result.session_id)
        .unwrap()
        .expect("session recorded");
    assert_eq!(view.session.totals.input_tokens, 200);
    assert!(view.session.totals.tokens_approximate);
    assert_eq!(view.files[0].preview.chars().count(), 500);
    assert_eq!(view.note.unwrap().content_hash, result.note_hash.unwrap());
}

#[tokio::test]
async fn test_cost_matches_rate_formula() {
    let provider = Arc::new(ScriptedProvider::replying("one two three four"));
    let (orchestrator, _tmp) = create_orchestrator(provider, Arc::new(WordTokenizer));

    let body = "word ".repeat(1200);
    let result = orchestrator
        .run_session(vec![txt("a.txt", &body)], "gpt-4", 0.5)
        .await
        .unwrap();

    assert_eq!(result.input_tokens.tokens, 1200);
    assert_eq!(result.output_tokens.tokens, 4);
    assert!(!result.input_tokens.approximate);
    let expected = 1200.0 / 1000.0 * 0.03 + 4.0 / 1000.0 * 0.06;
    assert!((result.total_cost() - expected).abs() < 1e-12);

    let view = orchestrator
        .storage()
        .get_session(&result.session_id)
        .unwrap()
        .unwrap();
    assert!((view.session.totals.estimated_cost - expected).abs() < 1e-12);
}

#[tokio::test]
async fn test_out_of_range_creativity_creates_no_session() {
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let (orchestrator, _tmp) = create_orchestrator(provider.clone(), Arc::new(BrokenTokenizer));

    let err = orchestrator
        .run_session(vec![txt("a.txt", "body")], "gpt-4", 1.5)
        .await
        .unwrap_err();

    assert_eq!(FailureKind::of(&err), Some(FailureKind::InvalidParameter));
    assert_eq!(provider.calls(), 0);
    assert_eq!(orchestrator.storage().count_sessions().unwrap(), 0);
}

#[tokio::test]
async fn test_mixed_batch_with_corrupt_pdf() {
    let provider = Arc::new(ScriptedProvider::replying("# Notes"));
    let (orchestrator, _tmp) = create_orchestrator(provider, Arc::new(BrokenTokenizer));

    let files = vec![
        txt("week1.txt", "Hypothesis testing basics"),
        txt("week2.txt", "Confidence intervals"),
        InputFile::new("scan.pdf", DocumentKind::Pdf, b"not really a pdf".to_vec()),
    ];
    let result = orchestrator.run_session(files, "gpt-4", 0.3).await.unwrap();
    assert_eq!(result.status, SessionStatus::Succeeded);

    let view = orchestrator
        .storage()
        .get_session(&result.session_id)
        .unwrap()
        .unwrap();
    let statuses: Vec<_> = view.files.iter().map(|f| f.status).collect();
    assert_eq!(
        statuses,
        vec![FileStatus::Parsed, FileStatus::Parsed, FileStatus::Failed]
    );
    assert_eq!(view.files[2].failure, Some(FailureKind::UnsupportedContent));
    assert!(view.files[2].preview.is_empty());
}

#[tokio::test]
async fn test_all_files_failing_is_recorded() {
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let (orchestrator, _tmp) = create_orchestrator(provider.clone(), Arc::new(BrokenTokenizer));

    let files = vec![
        InputFile::new("a.json", DocumentKind::Json, b"{\"unterminated\": ".to_vec()),
        InputFile::new("b.txt", DocumentKind::Txt, b"   \n\t ".to_vec()),
    ];
    let result = orchestrator.run_session(files, "gpt-4", 0.3).await.unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert_eq!(result.failure, Some(FailureKind::NoUsableInput));
    assert_eq!(provider.calls(), 0);

    let view = orchestrator
        .storage()
        .get_session(&result.session_id)
        .unwrap()
        .unwrap();
    assert_eq!(view.session.status, SessionStatus::Failed);
    assert!(view.note.is_none());
    assert_eq!(view.files[0].failure, Some(FailureKind::MalformedInput));
    assert_eq!(view.files[1].failure, Some(FailureKind::UnsupportedContent));
}

#[tokio::test]
async fn test_rate_limit_retried_within_budget() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Reply::RateLimited,
        Reply::Unavailable,
        Reply::Text("# Recovered"),
    ]));
    let (orchestrator, _tmp) = create_orchestrator(provider.clone(), Arc::new(BrokenTokenizer));

    let result = orchestrator
        .run_session(vec![txt("a.txt", "body")], "gpt-4", 0.3)
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.generation_attempts, 3);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_retry_budget_exhausted_records_failure() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Reply::RateLimited,
        Reply::RateLimited,
        Reply::RateLimited,
        Reply::Text("never reached"),
    ]));
    let (orchestrator, _tmp) = create_orchestrator(provider.clone(), Arc::new(BrokenTokenizer));

    let result = orchestrator
        .run_session(vec![txt("a.txt", &"y".repeat(40))], "gpt-4", 0.3)
        .await
        .unwrap();
    assert_eq!(result.failure, Some(FailureKind::RateLimited));
    assert_eq!(provider.calls(), 3);
    assert_eq!(result.input_tokens.tokens, 10);
    assert_eq!(result.output_tokens.tokens, 0);
}

#[tokio::test]
async fn test_authentication_failure_is_not_retried() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Auth]));
    let (orchestrator, _tmp) = create_orchestrator(provider.clone(), Arc::new(BrokenTokenizer));

    let result = orchestrator
        .run_session(vec![txt("a.txt", "body")], "gpt-4", 0.3)
        .await
        .unwrap();
    assert_eq!(result.failure, Some(FailureKind::AuthenticationFailure));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_cancellation_during_generation_leaves_no_record() {
    let provider =
        Arc::new(ScriptedProvider::replying("# late").with_delay(Duration::from_secs(30)));
    let (orchestrator, _tmp) = create_orchestrator(provider, Arc::new(BrokenTokenizer));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = orchestrator
        .run_session_with_cancel(vec![txt("a.txt", "body")], "gpt-4", 0.3, &cancel)
        .await
        .unwrap_err();
    assert_eq!(FailureKind::of(&err), Some(FailureKind::Cancelled));
    assert_eq!(orchestrator.storage().count_sessions().unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let provider = Arc::new(ScriptedProvider::replying("# Shared notes"));
    let (orchestrator, _tmp) = create_orchestrator(provider.clone(), Arc::new(BrokenTokenizer));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            let body = format!("lecture number {}", i);
            orchestrator
                .run_session(vec![txt(&format!("l{}.txt", i), &body)], "gpt-4", 0.1)
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.is_success());
        ids.push(result.session_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(provider.calls(), 8);

    let storage = orchestrator.storage();
    assert_eq!(storage.count_sessions().unwrap(), 8);
    for id in &ids {
        let view = storage.get_session(id).unwrap().unwrap();
        assert_eq!(view.files.len(), 1);
        assert!(view.note.is_some());
    }

    let summary = AnalyticsAggregator::new(storage.clone()).summary().unwrap();
    assert_eq!(summary.total_sessions, 8);
    assert_eq!(summary.success_rate, 100.0);
}

#[tokio::test]
async fn test_same_note_twice_shares_hash() {
    let provider = Arc::new(ScriptedProvider::replying("# Identical"));
    let (orchestrator, _tmp) = create_orchestrator(provider, Arc::new(BrokenTokenizer));

    let first = orchestrator
        .run_session(vec![txt("a.txt", "same")], "gpt-4", 0.3)
        .await
        .unwrap();
    let second = orchestrator
        .run_session(vec![txt("a.txt", "same")], "gpt-4", 0.3)
        .await
        .unwrap();
    assert_eq!(first.note_hash, second.note_hash);

    let storage = orchestrator.storage();
    let sessions = storage
        .note_occurrences(first.note_hash.as_deref().unwrap())
        .unwrap();
    assert_eq!(sessions.len(), 2);
    let files = storage
        .file_occurrences(&first.files[0].record.content_hash)
        .unwrap();
    assert_eq!(files.len(), 2);

    let found = storage
        .search(&SearchQuery {
            text: Some("identical".into()),
            ..SearchQuery::default()
        })
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_oversized_file_on_disk_is_recorded_unread() {
    let provider = Arc::new(ScriptedProvider::replying("# Notes"));
    let (orchestrator, tmp) = create_orchestrator(provider, Arc::new(BrokenTokenizer));

    let small = tmp.path().join("intro.txt");
    let large = tmp.path().join("dump.json");
    std::fs::write(&small, "Bayes rule").unwrap();
    std::fs::write(&large, format!("{{\"text\": \"{}\"}}", "w".repeat(4096))).unwrap();

    let files = vec![
        InputFile::from_path(&small, 1024).unwrap(),
        InputFile::from_path(&large, 1024).unwrap(),
    ];
    let result = orchestrator.run_session(files, "gpt-4", 0.3).await.unwrap();
    assert!(result.is_success());

    let view = orchestrator
        .storage()
        .get_session(&result.session_id)
        .unwrap()
        .unwrap();
    assert_eq!(view.files[0].status, FileStatus::Parsed);
    assert_eq!(view.files[1].status, FileStatus::Failed);
    assert_eq!(view.files[1].failure, Some(FailureKind::InputTooLarge));
    assert!(view.files[1].size_bytes > 4096);
}
