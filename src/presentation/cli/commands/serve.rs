use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::application::config::AppConfig;
use crate::application::services::dispatcher::NotificationDispatcher;
use crate::application::services::evaluation::EvaluationEngine;
use crate::application::services::ingest::IngestService;
use crate::application::services::live_registry::LiveSubscriberRegistry;
use crate::application::services::worker::{spawn_evaluation_worker, WorkerStats};
use crate::domain::ports::store::{
    AlarmLedger, EnclosureDirectory, RecipientDirectory, RuleStore, SampleStore,
};
use crate::domain::ports::transport::MessageTransport;
use crate::presentation::http::{router, AppState};

/// Everything the HTTP layer needs, plus the evaluation worker handle.
pub struct Pipeline {
    pub state: AppState,
    pub worker: JoinHandle<WorkerStats>,
}

/// Wire the alarm pipeline on top of a store and a transport:
/// registry → dispatcher → evaluation worker → ingest service.
///
/// Must be called from within a Tokio runtime (the worker is spawned here).
pub fn build_pipeline<S>(
    store: Arc<S>,
    transport: Arc<dyn MessageTransport>,
    config: &AppConfig,
) -> Pipeline
where
    S: EnclosureDirectory + RuleStore + RecipientDirectory + SampleStore + AlarmLedger + 'static,
{
    let registry = Arc::new(LiveSubscriberRegistry::new(config.pipeline.live_buffer));
    let dispatcher = NotificationDispatcher::new(
        store.clone(),
        transport,
        store.clone(),
        registry.clone(),
        config.notifications.send_timeout(),
    );
    let engine = Arc::new(EvaluationEngine::new(
        store.clone(),
        store.clone(),
        dispatcher,
    ));
    let (queue, worker) = spawn_evaluation_worker(
        engine,
        config.pipeline.queue_capacity,
        config.pipeline.max_in_flight,
    );
    let ingest = Arc::new(IngestService::new(store.clone(), store, queue));

    Pipeline {
        state: AppState::new(ingest, registry),
        worker,
    }
}

/// Serve HTTP on `listener` until `shutdown` resolves, then let the
/// evaluation worker drain.
///
/// On shutdown every live subscriber is disconnected so open WebSocket
/// connections do not hold the server open.
///
/// # Errors
///
/// Returns an error if the server fails or the worker task panics.
pub async fn run_serve<F>(
    listener: TcpListener,
    pipeline: Pipeline,
    shutdown: F,
) -> anyhow::Result<WorkerStats>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Pipeline { state, worker } = pipeline;
    let registry = state.registry.clone();
    let app = router(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "cabwatch listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutdown requested, closing connections");
            registry.disconnect_all();
        })
        .await
        .context("HTTP server failed")?;

    // The router (and with it the last queue handle) is gone, so the worker
    // finishes once its in-flight jobs are done.
    let stats = worker.await.context("evaluation worker panicked")?;
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::services::ingest::IngestRequest;
    use crate::domain::value_objects::comparison::ComparisonOperator;
    use crate::infrastructure::notifications::log_file::LogFileTransport;
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;

    #[tokio::test]
    async fn pipeline_drains_after_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mailbox = dir.path().join("mailbox.jsonl");
        let store = Arc::new(InMemoryStore::new());
        let enclosure = store.add_enclosure("Rack A", "Room 1");
        store.add_rule(enclosure.id, ComparisonOperator::GreaterThan, 30.0);
        store.add_recipient("ops@example.com", true);

        let transport = Arc::new(LogFileTransport::new(
            mailbox.to_str().expect("path"),
            "cabwatch@localhost",
        ));
        let pipeline = build_pipeline(store.clone(), transport, &AppConfig::default());
        pipeline
            .state
            .ingest
            .ingest(IngestRequest {
                enclosure_id: enclosure.id,
                temperature: 35.0,
                humidity: 40.0,
            })
            .await
            .expect("ingest");

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let stats = run_serve(listener, pipeline, async {})
            .await
            .expect("serve");

        assert_eq!(stats.samples_evaluated, 1);
        assert_eq!(stats.alarms_raised, 1);
        let mailbox = std::fs::read_to_string(&mailbox).expect("mailbox");
        assert_eq!(mailbox.lines().count(), 1);
    }
}
