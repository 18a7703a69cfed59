pub mod dispatcher;
pub mod evaluation;
pub mod ingest;
pub mod live_registry;
pub mod worker;
