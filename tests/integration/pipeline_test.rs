#![allow(clippy::expect_used)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cabwatch::application::config::AppConfig;
use cabwatch::application::services::dispatcher::NotificationDispatcher;
use cabwatch::application::services::evaluation::EvaluationEngine;
use cabwatch::application::services::ingest::{IngestError, IngestRequest};
use cabwatch::application::services::live_registry::LiveSubscriberRegistry;
use cabwatch::domain::entities::sample::NewSample;
use cabwatch::domain::ports::store::{AlarmLedger, SampleStore};
use cabwatch::domain::ports::transport::{MessageTransport, OutgoingMessage, TransportError};
use cabwatch::domain::value_objects::comparison::ComparisonOperator;
use cabwatch::infrastructure::persistence::sqlite_store::SqliteStore;
use cabwatch::presentation::cli::commands::serve::build_pipeline;

/// Records every successful send; refuses the configured addresses.
#[derive(Default)]
struct RecordingTransport {
    failing: HashSet<String>,
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
}

impl RecordingTransport {
    fn failing_for(addresses: &[&str]) -> Self {
        Self {
            failing: addresses.iter().map(|a| (*a).to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn recipients(&self) -> Vec<String> {
        let mut recipients: Vec<String> = self
            .sent
            .lock()
            .expect("sent lock")
            .iter()
            .map(|(to, _)| to.clone())
            .collect();
        recipients.sort();
        recipients
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, address: &str, message: &OutgoingMessage) -> Result<(), TransportError> {
        if self.failing.contains(address) {
            return Err(TransportError::SendFailed("mailbox full".into()));
        }
        self.sent
            .lock()
            .expect("sent lock")
            .push((address.to_string(), message.clone()));
        Ok(())
    }
}

fn open_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
    let path = dir.path().join("cabwatch.db");
    Arc::new(SqliteStore::new(path.to_str().expect("path")).expect("store"))
}

#[tokio::test]
async fn hot_reading_notifies_every_healthy_recipient() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let enclosure = store.add_enclosure("Rack A", "Room 1").expect("enclosure");
    store
        .add_rule(enclosure.id, ComparisonOperator::GreaterThan, 30.0, None)
        .expect("rule");
    for address in ["a@example.com", "b@example.com", "c@example.com"] {
        store.add_recipient(address, true).expect("recipient");
    }
    store.add_recipient("muted@example.com", false).expect("muted");

    let transport = Arc::new(RecordingTransport::failing_for(&["b@example.com"]));
    let pipeline = build_pipeline(store.clone(), transport.clone(), &AppConfig::default());
    let mut live = pipeline.state.registry.subscribe();

    let sample = pipeline
        .state
        .ingest
        .ingest(IngestRequest {
            enclosure_id: enclosure.id,
            temperature: 31.5,
            humidity: 40.0,
        })
        .await
        .expect("ingest");

    let alert = live.recv().await.expect("live alert");
    assert_eq!(alert.enclosure, "Rack A");
    assert_eq!(alert.operator, ">");

    drop(pipeline.state);
    let stats = pipeline.worker.await.expect("worker");
    assert_eq!(stats.alarms_raised, 1);

    assert_eq!(
        transport.recipients(),
        vec!["a@example.com".to_string(), "c@example.com".to_string()]
    );
    let (_, message) = transport.sent.lock().expect("sent lock")[0].clone();
    assert!(message.subject.contains("Rack A"));
    assert!(message.body.contains("31.50"));

    let alarms = store.alarms_for_sample(sample.id).expect("alarms");
    assert_eq!(alarms.len(), 1);
    assert!(alarms[0].delivered);
}

#[tokio::test]
async fn one_alarm_per_firing_rule() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let enclosure = store.add_enclosure("Rack B", "Room 2").expect("enclosure");
    let firing = [
        store
            .add_rule(enclosure.id, ComparisonOperator::GreaterThan, 25.0, None)
            .expect("rule"),
        store
            .add_rule(enclosure.id, ComparisonOperator::GreaterOrEqual, 28.0, None)
            .expect("rule"),
    ];
    store
        .add_rule(enclosure.id, ComparisonOperator::LessThan, 10.0, None)
        .expect("rule");
    store
        .add_rule(enclosure.id, ComparisonOperator::GreaterThan, 40.0, None)
        .expect("rule");

    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store.clone(), transport, &AppConfig::default());
    let sample = pipeline
        .state
        .ingest
        .ingest(IngestRequest {
            enclosure_id: enclosure.id,
            temperature: 28.0,
            humidity: 50.0,
        })
        .await
        .expect("ingest");

    drop(pipeline.state);
    pipeline.worker.await.expect("worker");

    let rule_ids: Vec<i64> = store
        .alarms_for_sample(sample.id)
        .expect("alarms")
        .iter()
        .map(|a| a.rule_id)
        .collect();
    assert_eq!(rule_ids, vec![firing[0].id, firing[1].id]);
}

#[tokio::test]
async fn cool_reading_is_stored_without_alarm() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let enclosure = store.add_enclosure("Rack A", "Room 1").expect("enclosure");
    store
        .add_rule(enclosure.id, ComparisonOperator::GreaterThan, 30.0, None)
        .expect("rule");
    store.add_recipient("ops@example.com", true).expect("recipient");

    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store.clone(), transport.clone(), &AppConfig::default());
    let sample = pipeline
        .state
        .ingest
        .ingest(IngestRequest {
            enclosure_id: enclosure.id,
            temperature: 29.9,
            humidity: 40.0,
        })
        .await
        .expect("ingest");

    drop(pipeline.state);
    let stats = pipeline.worker.await.expect("worker");
    assert_eq!(stats.samples_evaluated, 1);
    assert_eq!(stats.alarms_raised, 0);
    assert!(store.alarms_for_sample(sample.id).expect("alarms").is_empty());
    assert!(transport.recipients().is_empty());
}

#[tokio::test]
async fn unknown_enclosure_rejected_before_anything_is_stored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store.clone(), transport.clone(), &AppConfig::default());

    let err = pipeline
        .state
        .ingest
        .ingest(IngestRequest {
            enclosure_id: 77,
            temperature: 90.0,
            humidity: 40.0,
        })
        .await
        .expect_err("rejected");
    assert!(matches!(err, IngestError::UnknownEnclosure(77)));

    drop(pipeline.state);
    let stats = pipeline.worker.await.expect("worker");
    assert_eq!(stats.samples_evaluated, 0);

    // The first sample stored after the rejection still gets id 1.
    let enclosure = store.add_enclosure("Rack A", "Room 1").expect("enclosure");
    let first = store
        .insert_sample(&cabwatch::domain::entities::sample::NewSample::now(
            enclosure.id,
            20.0,
            40.0,
        ))
        .expect("insert");
    assert_eq!(first.id, 1);
    assert!(store.get_alarm(1).expect("read").is_none());
}

#[tokio::test]
async fn reevaluating_a_sample_keeps_one_alarm_and_one_notification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let enclosure = store.add_enclosure("Rack A", "Room 1").expect("enclosure");
    store
        .add_rule(enclosure.id, ComparisonOperator::GreaterThan, 30.0, None)
        .expect("rule");
    store.add_recipient("ops@example.com", true).expect("recipient");

    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = NotificationDispatcher::new(
        store.clone(),
        transport.clone(),
        store.clone(),
        Arc::new(LiveSubscriberRegistry::new(4)),
        Duration::from_secs(5),
    );
    let engine = EvaluationEngine::new(store.clone(), store.clone(), dispatcher);
    let sample = store
        .insert_sample(&NewSample::now(enclosure.id, 31.5, 40.0))
        .expect("sample");

    let first = engine.evaluate(&sample, &enclosure).await.expect("first");
    let second = engine.evaluate(&sample, &enclosure).await.expect("second");

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(store.alarms_for_sample(sample.id).expect("alarms").len(), 1);
    assert_eq!(transport.recipients(), vec!["ops@example.com".to_string()]);
}
