//! Rule set loading over HTTP and from disk, feeding the engine

mod common;

use common::{inbox_message, InMemoryStore, RecordingReporter};
use inbox_triage::cli;
use inbox_triage::engine::{EngineOptions, RuleEngine, RunPhase};
use inbox_triage::error::TriageError;
use inbox_triage::report::RuleStatus;
use inbox_triage::rules::RuleSetSource;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RULE_SET: &str = r#"[
    {"label": "Newsletters", "older_than": "30d",
     "actions": {"archive": true, "mark_as_read": true}},
    {"query": ["from:alerts@example.com", "subject:digest"], "older_than": "1d",
     "actions": {"add": ["Digests"], "remove": "UNREAD"}}
]"#;

async fn serve(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rules.json"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_load_rules_from_url() {
    let server = serve(200, RULE_SET).await;
    let source: RuleSetSource = format!("{}/rules.json", server.uri()).parse().unwrap();
    assert!(matches!(source, RuleSetSource::Url(_)));

    let records = source.load().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].older_than, "1d");
}

#[tokio::test]
async fn test_http_error_status_is_fatal() {
    let server = serve(404, "not here").await;
    let source = RuleSetSource::Url(format!("{}/rules.json", server.uri()));

    let err = source.load().await.unwrap_err();
    assert!(matches!(err, TriageError::ConfigurationFatal(_)));
    assert!(err.is_fatal());
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_malformed_remote_rule_set_is_fatal() {
    let server = serve(200, r#"[{"labels": "A", "older_than": 30, "actions": {}}]"#).await;
    let source = RuleSetSource::Url(format!("{}/rules.json", server.uri()));

    assert!(matches!(
        source.load().await,
        Err(TriageError::ConfigurationFatal(_))
    ));
}

#[tokio::test]
async fn test_run_from_remote_source() {
    let server = serve(200, RULE_SET).await;
    let source = RuleSetSource::Url(format!("{}/rules.json", server.uri()));
    let store = InMemoryStore::with_messages(vec![
        inbox_message("n1", "news@example.com", &["Newsletters"]),
        inbox_message("d1", "alerts@example.com", &[]),
    ]);

    let mut engine = RuleEngine::new(store, RecordingReporter::default(), EngineOptions::default()).unwrap();
    let summary = engine.run_from_source(&source).await.unwrap();

    assert_eq!(engine.phase(), RunPhase::Done);
    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.outcomes[0].status, RuleStatus::Mutated);
    assert_eq!(
        summary.outcomes[1].query.as_deref(),
        Some("from:alerts@example.com subject:digest")
    );
    assert_eq!(summary.outcomes[1].labels_added, vec!["Digests"]);
    assert_eq!(summary.outcomes[1].labels_removed, vec!["UNREAD"]);
    assert_eq!(summary.totals.mutated, 2);

    assert!(engine.store().labels_of("d1").contains("Digests"));
    assert!(!engine.store().labels_of("d1").contains("UNREAD"));
}

#[tokio::test]
async fn test_unreachable_source_aborts_before_any_rule() {
    let server = serve(500, "boom").await;
    let source = RuleSetSource::Url(format!("{}/rules.json", server.uri()));

    let mut engine = RuleEngine::new(
        InMemoryStore::default(),
        RecordingReporter::default(),
        EngineOptions::default(),
    )
    .unwrap();

    let err = engine.run_from_source(&source).await.unwrap_err();
    assert!(matches!(err, TriageError::ConfigurationFatal(_)));
    assert_eq!(engine.phase(), RunPhase::Aborted);
    assert!(engine.store().searches.lock().unwrap().is_empty());
    assert!(engine.reporter().outcomes.is_empty());
    assert!(engine.reporter().summaries.is_empty());
}

#[tokio::test]
async fn test_report_written_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let rules_path = dir.path().join("labels.json");
    tokio::fs::write(&rules_path, RULE_SET).await.unwrap();

    let store = InMemoryStore::with_messages(vec![inbox_message(
        "n1",
        "news@example.com",
        &["Newsletters"],
    )]);
    let mut engine = RuleEngine::new(
        store,
        RecordingReporter::default(),
        EngineOptions {
            limit: 10,
            simulate: true,
        },
    )
    .unwrap();

    let source: RuleSetSource = rules_path.to_str().unwrap().parse().unwrap();
    let summary = engine.run_from_source(&source).await.unwrap();

    let report_path = dir.path().join("reports").join("run.md");
    summary.save(&report_path).await.unwrap();
    let markdown = tokio::fs::read_to_string(&report_path).await.unwrap();
    assert!(markdown.contains(&summary.run_id));
    assert!(markdown.contains("Snippet of n1"));
}

#[tokio::test]
async fn test_cli_run_loads_rules_through_engine() {
    let server = serve(200, RULE_SET).await;
    let source = RuleSetSource::Url(format!("{}/rules.json", server.uri()));
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("run.md");

    let store = InMemoryStore::with_messages(vec![inbox_message(
        "n1",
        "news@example.com",
        &["Newsletters"],
    )]);
    let options = EngineOptions {
        limit: 10,
        simulate: false,
    };

    let summary = cli::triage_with_store(store, &source, options, Some(&report_path))
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.outcomes[0].status, RuleStatus::Mutated);
    assert_eq!(summary.totals.mutated, 1);
    assert!(report_path.exists());
}

#[tokio::test]
async fn test_cli_run_with_missing_rules_is_fatal_and_writes_no_report() {
    let server = serve(404, "not found").await;
    let source = RuleSetSource::Url(format!("{}/rules.json", server.uri()));
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("run.md");

    let err = cli::triage_with_store(
        InMemoryStore::default(),
        &source,
        EngineOptions::default(),
        Some(&report_path),
    )
    .await
    .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, TriageError::ConfigurationFatal(_)));
    assert!(!report_path.exists());
}
