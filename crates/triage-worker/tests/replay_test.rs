//! Replay and single-action runs against fixture files, with an in-process
//! classifier standing in for the model endpoint.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;

use triage::adapters::{AdapterResult, Classifier, TicketText};
use triage::{
    InMemoryStore, Priority, Services, TicketStatus, TicketStore, TriageConfig, TriageSuggestion,
};
use triage_worker::runtime;
use triage_worker::LogNotifier;

const FIXTURES: &str = r#"{
  "users": [
    { "id": "u-1", "email": "reporter@example.com", "role": "user" },
    { "id": "m-docker", "email": "docker@example.com", "role": "moderator", "skills": ["docker", "ci"] },
    { "id": "a-1", "email": "admin@example.com", "role": "admin" }
  ],
  "tickets": [
    {
      "id": "t-1",
      "title": "Docker build fails",
      "description": "layer cache corrupted",
      "status": "CREATED",
      "createdBy": "u-1",
      "createdAt": "2024-05-01T12:00:00Z"
    },
    {
      "id": "t-2",
      "title": "Printer jam",
      "description": "third floor",
      "status": "CREATED",
      "createdBy": "u-1",
      "createdAt": "2024-05-01T12:05:00Z"
    }
  ]
}"#;

/// Suggests Docker skills for anything mentioning Docker, nothing otherwise.
struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &TicketText) -> AdapterResult<Option<TriageSuggestion>> {
        if !text.title.contains("Docker") {
            return Ok(None);
        }
        Ok(Some(TriageSuggestion {
            summary: Some("Docker build broken".into()),
            priority: Some("High".into()),
            helpful_notes: Some("Prune the builder cache".into()),
            related_skills: Some(vec!["Docker".into()]),
        }))
    }
}

fn fixture_store() -> (tempfile::NamedTempFile, Arc<InMemoryStore>) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURES.as_bytes()).unwrap();
    let fixtures = runtime::load_fixtures(file.path()).unwrap();
    (file, Arc::new(InMemoryStore::from_fixtures(fixtures)))
}

fn services(store: Arc<InMemoryStore>) -> Services {
    Services::new(store, Arc::new(KeywordClassifier), Arc::new(LogNotifier))
}

#[tokio::test]
async fn test_replay_runs_every_event_and_keeps_input_order() {
    let (_file, store) = fixture_store();
    let dispatcher = runtime::dispatcher(&services(store.clone()), &TriageConfig::default());

    let events = runtime::parse_events(
        r#"
{"name": "ticket/created", "payload": {"ticketId": "t-1"}}

{"name": "ticket/created", "payload": {"ticketId": "t-2"}}
{"name": "ticket/escalated", "payload": {"ticketId": "t-1"}}
{"name": "ticket/created", "payload": {"ticketId": "t-404"}}
"#,
    )
    .unwrap();
    assert_eq!(events.len(), 4);

    let outcomes = runtime::replay(dispatcher.shared(), events).await.unwrap();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes[0].run().unwrap().is_success());
    assert!(outcomes[1].run().unwrap().is_success());
    assert!(outcomes[2].is_dropped());
    assert!(!outcomes[3].is_success());

    let docker = store.load_ticket("t-1").await.unwrap().unwrap();
    assert_eq!(docker.status, TicketStatus::InProgress);
    assert_eq!(docker.priority, Some(Priority::High));
    assert_eq!(docker.assigned_to.as_deref(), Some("m-docker"));

    // No classification: TODO, and every moderator is a candidate.
    let printer = store.load_ticket("t-2").await.unwrap().unwrap();
    assert_eq!(printer.status, TicketStatus::Todo);
    assert_eq!(printer.priority, None);
    assert_eq!(printer.assigned_to.as_deref(), Some("m-docker"));
}

#[test]
fn test_bad_event_line_reports_its_number() {
    let err = runtime::parse_events("{\"name\": \"ticket/created\"}\nnot json\n").unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
}

#[tokio::test]
async fn test_create_action_waits_for_triage() {
    let (_file, store) = fixture_store();
    let dispatcher = runtime::dispatcher(&services(store.clone()), &TriageConfig::default());

    let (ticket, report) = runtime::run_action(store.clone(), dispatcher, 16, |service| async move {
        service
            .create("Docker compose hangs", "on `up`", "u-1")
            .await
    })
    .await
    .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(ticket.status, TicketStatus::InProgress);
    assert_eq!(ticket.assigned_to.as_deref(), Some("m-docker"));
}

#[tokio::test]
async fn test_rejected_action_surfaces_the_error() {
    let (_file, store) = fixture_store();
    let dispatcher = runtime::dispatcher(&services(store.clone()), &TriageConfig::default());

    let result = runtime::run_action(store, dispatcher, 16, |service| async move {
        service.close("t-404", "gone").await
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_saved_fixtures_round_trip_through_the_store() {
    let (file, store) = fixture_store();
    store
        .patch_ticket("t-2", &triage::TicketPatch::new().status(TicketStatus::Closed))
        .await
        .unwrap();

    runtime::save_fixtures(file.path(), &store.snapshot().await).unwrap();
    let reloaded = InMemoryStore::from_fixtures(runtime::load_fixtures(file.path()).unwrap());
    let t2 = reloaded.load_ticket("t-2").await.unwrap().unwrap();
    assert_eq!(t2.status, TicketStatus::Closed);
}
