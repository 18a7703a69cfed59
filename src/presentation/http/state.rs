use std::sync::Arc;

use crate::application::services::ingest::IngestService;
use crate::application::services::live_registry::LiveSubscriberRegistry;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub registry: Arc<LiveSubscriberRegistry>,
}

impl AppState {
    #[must_use]
    pub const fn new(ingest: Arc<IngestService>, registry: Arc<LiveSubscriberRegistry>) -> Self {
        Self { ingest, registry }
    }
}
